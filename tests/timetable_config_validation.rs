
use serde_json::json;
use test_support::{request_err, request_ok, select_workspace, spawn_sidecar};

#[test]
fn too_few_slots_fails_fast_without_writes() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _workspace = select_workspace(&mut stdin, &mut reader, "schoold-config-slots");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "timetable.generate",
        json!({
            "timeSlots": [
                { "start": "09:00", "end": "09:45" },
                { "start": "10:00", "end": "10:45" },
                { "start": "11:00", "end": "11:45" },
                { "start": "12:00", "end": "12:45" }
            ]
        }),
    );
    assert_eq!(code, "bad_config");

    // Rejected before any write: no teachers were provisioned, no classes
    // created.
    let teachers = request_ok(&mut stdin, &mut reader, "2", "teachers.list", json!({}));
    assert_eq!(teachers["teachers"].as_array().map(|a| a.len()), Some(0));
    let classes = request_ok(&mut stdin, &mut reader, "3", "classes.list", json!({}));
    assert_eq!(classes["classes"].as_array().map(|a| a.len()), Some(0));
}

#[test]
fn invalid_class_ranges_are_rejected() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _workspace = select_workspace(&mut stdin, &mut reader, "schoold-config-range");

    for (i, range) in [[0, 12], [7, 3], [1, 13]].iter().enumerate() {
        let code = request_err(
            &mut stdin,
            &mut reader,
            &format!("r{}", i),
            "timetable.generate",
            json!({ "classRange": range }),
        );
        assert_eq!(code, "bad_config", "range {:?}", range);
    }
}

#[test]
fn narrowed_config_is_honored() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _workspace = select_workspace(&mut stdin, &mut reader, "schoold-config-narrow");

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "timetable.generate",
        json!({
            "classRange": [1, 6],
            "subjects": ["English", "Mathematics"],
            "maxClassesPerTeacher": 5,
            "timeSlots": [
                { "start": "08:00", "end": "08:50" },
                { "start": "09:00", "end": "09:50" },
                { "start": "10:00", "end": "10:50" }
            ]
        }),
    );
    // ceil(6 / 5) = 2 teachers per subject.
    assert_eq!(summary["teachersPerSubject"], json!(2));
    assert_eq!(summary["teachersCreated"], json!(4));
    assert_eq!(summary["classesProcessed"], json!(6));
    // 6 classes x 2 subjects x 5 weekdays.
    assert_eq!(summary["entriesWritten"], json!(60));

    let classes = request_ok(&mut stdin, &mut reader, "2", "classes.list", json!({}));
    assert_eq!(classes["classes"].as_array().map(|a| a.len()), Some(6));

    let table = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "timetable.forClass",
        json!({ "classNumber": 1 }),
    );
    let subjects = table["subjects"].as_array().expect("subjects array");
    assert_eq!(subjects.len(), 2);
    let start_a = subjects[0]["schedule"][0]["startTime"].as_str().expect("start");
    let start_b = subjects[1]["schedule"][0]["startTime"].as_str().expect("start");
    assert_ne!(start_a, start_b, "subjects collide within the class");
}

#[test]
fn blank_subject_names_are_skipped_not_fatal() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _workspace = select_workspace(&mut stdin, &mut reader, "schoold-config-blank");

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "timetable.generate",
        json!({
            "subjects": ["English", "   ", "Science"],
            "timeSlots": [
                { "start": "09:00", "end": "09:45" },
                { "start": "10:00", "end": "10:45" },
                { "start": "11:00", "end": "11:45" }
            ]
        }),
    );
    assert_eq!(summary["skipped"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(summary["classesProcessed"], json!(12));
    // Only the two real subjects were provisioned.
    assert_eq!(summary["teachersCreated"], json!(6));

    let table = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "timetable.forClass",
        json!({ "classNumber": 4 }),
    );
    assert_eq!(table["subjects"].as_array().map(|a| a.len()), Some(2));
}
