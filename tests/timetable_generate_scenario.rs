
use serde_json::json;
use test_support::{request_ok, select_workspace, spawn_sidecar};

// Default configuration: 12 classes, 5 subjects, cap 5, empty teacher pool.
#[test]
fn default_run_provisions_and_fills_every_class() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _workspace = select_workspace(&mut stdin, &mut reader, "schoold-scenario");

    let summary = request_ok(&mut stdin, &mut reader, "1", "timetable.generate", json!({}));
    assert_eq!(summary["teachersPerSubject"], json!(3));
    assert_eq!(summary["teachersCreated"], json!(15));
    assert_eq!(summary["classesProcessed"], json!(12));
    // 12 classes x 5 subjects x 5 weekdays, all entries distinct.
    assert_eq!(summary["entriesWritten"], json!(300));
    assert_eq!(summary["skipped"].as_array().map(|a| a.len()), Some(0));

    let teachers = request_ok(&mut stdin, &mut reader, "2", "teachers.list", json!({}));
    assert_eq!(teachers["teachers"].as_array().map(|a| a.len()), Some(15));

    let classes = request_ok(&mut stdin, &mut reader, "3", "classes.list", json!({}));
    let classes = classes["classes"].as_array().expect("classes array");
    assert_eq!(classes.len(), 12);
    for class in classes {
        assert_eq!(class["subjectCount"], json!(5));
    }

    // Every class carries 5 subjects, each with one slot per weekday, and the
    // 5 subjects occupy 5 distinct times within the class.
    for class_number in 1..=12 {
        let table = request_ok(
            &mut stdin,
            &mut reader,
            &format!("t{}", class_number),
            "timetable.forClass",
            json!({ "classNumber": class_number }),
        );
        let subjects = table["subjects"].as_array().expect("subjects array");
        assert_eq!(subjects.len(), 5, "class {}", class_number);

        let mut starts = Vec::new();
        for entry in subjects {
            assert!(entry["teacherId"].is_string(), "class {}", class_number);
            let schedule = entry["schedule"].as_array().expect("schedule array");
            assert_eq!(schedule.len(), 5, "class {}", class_number);
            let first_start = schedule[0]["startTime"].as_str().expect("startTime");
            // All weekdays share the class's slot for this subject.
            for item in schedule {
                assert_eq!(item["startTime"].as_str(), Some(first_start));
                assert_eq!(
                    item["room"].as_str(),
                    Some(format!("Room {}", class_number).as_str())
                );
            }
            starts.push(first_start.to_string());
        }
        starts.sort();
        starts.dedup();
        assert_eq!(starts.len(), 5, "class {} has colliding slots", class_number);
    }
}

#[test]
fn teacher_view_respects_block_load_cap() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _workspace = select_workspace(&mut stdin, &mut reader, "schoold-blockload");

    let _ = request_ok(&mut stdin, &mut reader, "1", "timetable.generate", json!({}));

    let teachers = request_ok(&mut stdin, &mut reader, "2", "teachers.list", json!({}));
    let teachers = teachers["teachers"].as_array().expect("teachers array");
    for (i, teacher) in teachers.iter().enumerate() {
        let id = teacher["id"].as_str().expect("teacher id");
        let schedule = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "timetable.forTeacher",
            json!({ "teacherId": id }),
        );
        let entries = schedule["entries"].as_array().expect("entries array");
        // At most classesInBlock x 5 weekday entries; blocks are at most 5
        // classes wide.
        assert!(entries.len() <= 25, "teacher {} has {}", id, entries.len());
        assert!(!entries.is_empty(), "teacher {} has no schedule", id);

        let mut classes: Vec<i64> = entries
            .iter()
            .filter_map(|e| e["classNumber"].as_i64())
            .collect();
        classes.sort_unstable();
        classes.dedup();
        assert!(classes.len() <= 5, "teacher {} over class cap", id);
    }
}
