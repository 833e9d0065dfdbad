
use serde_json::json;
use std::collections::HashMap;
use test_support::{request_ok, select_workspace, spawn_sidecar};

fn short_day(full: &str) -> &'static str {
    match full {
        "monday" => "Mon",
        "tuesday" => "Tue",
        "wednesday" => "Wed",
        "thursday" => "Thu",
        "friday" => "Fri",
        other => panic!("unexpected day {}", other),
    }
}

// The consistency contract between the two denormalized views: every
// weekday/time pair a class table records for a (subject, teacher) assignment
// must appear in that teacher's weekly entry list with matching class number,
// subject name, and times.
#[test]
fn class_tables_and_teacher_schedules_agree() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _workspace = select_workspace(&mut stdin, &mut reader, "schoold-crossview");

    let _ = request_ok(&mut stdin, &mut reader, "1", "timetable.generate", json!({}));

    let mut teacher_entries: HashMap<String, Vec<serde_json::Value>> = HashMap::new();
    let mut next_id = 100;

    for class_number in 1..=12 {
        let table = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{}", class_number),
            "timetable.forClass",
            json!({ "classNumber": class_number }),
        );
        for subject in table["subjects"].as_array().expect("subjects array") {
            let teacher_id = subject["teacherId"].as_str().expect("teacherId").to_string();
            let subject_name = subject["subjectName"].as_str().expect("subjectName");

            let entries = teacher_entries.entry(teacher_id.clone()).or_insert_with(|| {
                next_id += 1;
                let schedule = request_ok(
                    &mut stdin,
                    &mut reader,
                    &format!("t{}", next_id),
                    "timetable.forTeacher",
                    json!({ "teacherId": teacher_id.clone() }),
                );
                schedule["entries"].as_array().expect("entries array").clone()
            });

            for item in subject["schedule"].as_array().expect("schedule array") {
                let day = short_day(item["day"].as_str().expect("day"));
                let start = item["startTime"].as_str().expect("startTime");
                let end = item["endTime"].as_str().expect("endTime");
                let found = entries.iter().any(|e| {
                    e["day"].as_str() == Some(day)
                        && e["classNumber"].as_i64() == Some(class_number)
                        && e["subject"].as_str() == Some(subject_name)
                        && e["startTime"].as_str() == Some(start)
                        && e["endTime"].as_str() == Some(end)
                });
                assert!(
                    found,
                    "class {} subject {} {} {}-{} missing from teacher {} schedule",
                    class_number, subject_name, day, start, end, teacher_id
                );
            }
        }
    }

    // Each teacher's entry list is a set: no duplicated tuples.
    for (teacher_id, entries) in &teacher_entries {
        let mut keys: Vec<String> = entries.iter().map(|e| e.to_string()).collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total, "duplicate entries for teacher {}", teacher_id);
    }
}
