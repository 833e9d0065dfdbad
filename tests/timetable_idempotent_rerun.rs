
use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{request_ok, select_workspace, spawn_sidecar};

fn snapshot(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    tag: &str,
) -> (Vec<serde_json::Value>, Vec<serde_json::Value>) {
    let mut class_tables = Vec::new();
    for class_number in 1..=12 {
        class_tables.push(request_ok(
            stdin,
            reader,
            &format!("{}c{}", tag, class_number),
            "timetable.forClass",
            json!({ "classNumber": class_number }),
        ));
    }

    let teachers = request_ok(stdin, reader, &format!("{}tl", tag), "teachers.list", json!({}));
    let mut ids: Vec<String> = teachers["teachers"]
        .as_array()
        .expect("teachers array")
        .iter()
        .map(|t| t["id"].as_str().expect("id").to_string())
        .collect();
    ids.sort();

    let mut teacher_schedules = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        teacher_schedules.push(request_ok(
            stdin,
            reader,
            &format!("{}t{}", tag, i),
            "timetable.forTeacher",
            json!({ "teacherId": id }),
        ));
    }
    (class_tables, teacher_schedules)
}

#[test]
fn rerun_with_unchanged_config_reproduces_both_views() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _workspace = select_workspace(&mut stdin, &mut reader, "schoold-idempotent");

    let first = request_ok(&mut stdin, &mut reader, "g1", "timetable.generate", json!({}));
    assert_eq!(first["teachersCreated"], json!(15));
    let (classes_a, teachers_a) = snapshot(&mut stdin, &mut reader, "a");

    let second = request_ok(&mut stdin, &mut reader, "g2", "timetable.generate", json!({}));
    // The pool is already sufficient: nothing new is provisioned, and the
    // rebuilt views are bit-for-bit identical.
    assert_eq!(second["teachersCreated"], json!(0));
    assert_eq!(second["entriesWritten"], first["entriesWritten"]);
    let (classes_b, teachers_b) = snapshot(&mut stdin, &mut reader, "b");

    assert_eq!(classes_a, classes_b);
    assert_eq!(teachers_a, teachers_b);
}
