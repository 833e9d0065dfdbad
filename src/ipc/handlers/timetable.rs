use super::classes::{self, ClassLookupParams, HandlerErr};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::timetable::{generate, GenerateError, TimetableConfig};
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::json;

fn generate_err(e: GenerateError) -> HandlerErr {
    match e {
        GenerateError::Config(msg) => HandlerErr {
            code: "bad_config",
            message: msg,
            details: None,
        },
        GenerateError::Store(e) => HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: None,
        },
    }
}

fn timetable_generate(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let config = if params.is_null() {
        TimetableConfig::default()
    } else {
        serde_json::from_value(params.clone()).map_err(|e| HandlerErr {
            code: "bad_params",
            message: e.to_string(),
            details: None,
        })?
    };
    let summary = generate(conn, &config).map_err(generate_err)?;
    let summary_json = serde_json::to_value(&summary).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;
    Ok(summary_json)
}

fn timetable_for_class(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let p: ClassLookupParams = serde_json::from_value(params.clone()).map_err(|e| HandlerErr {
        code: "bad_params",
        message: e.to_string(),
        details: None,
    })?;
    let Some(class) = classes::find_class(conn, &p)? else {
        return Err(HandlerErr {
            code: "not_found",
            message: "class not found".to_string(),
            details: None,
        });
    };
    let subjects = classes::subjects_table_json(conn, &class.id)?;
    Ok(json!({
        "classId": class.id,
        "classNumber": class.class_number,
        "section": class.section,
        "academicYear": class.academic_year,
        "subjects": subjects,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForTeacherParams {
    teacher_id: String,
}

fn timetable_for_teacher(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let p: ForTeacherParams = serde_json::from_value(params.clone()).map_err(|e| HandlerErr {
        code: "bad_params",
        message: e.to_string(),
        details: None,
    })?;

    let teacher_name: Option<String> = conn
        .query_row(
            "SELECT name FROM users WHERE id = ? AND role = 'teacher'",
            [&p.teacher_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(classes::query_failed)?;
    let Some(teacher_name) = teacher_name else {
        return Err(HandlerErr {
            code: "not_found",
            message: "teacher not found".to_string(),
            details: None,
        });
    };

    let mut stmt = conn
        .prepare(
            "SELECT day, class_number, subject, period, start_time, end_time
             FROM schedule_entries
             WHERE teacher_id = ?
             ORDER BY CASE day
                 WHEN 'Mon' THEN 0
                 WHEN 'Tue' THEN 1
                 WHEN 'Wed' THEN 2
                 WHEN 'Thu' THEN 3
                 WHEN 'Fri' THEN 4
                 ELSE 5 END,
               period, class_number",
        )
        .map_err(classes::query_failed)?;
    let entries = stmt
        .query_map([&p.teacher_id], |r| {
            Ok(json!({
                "day": r.get::<_, String>(0)?,
                "classNumber": r.get::<_, i64>(1)?,
                "subject": r.get::<_, String>(2)?,
                "period": r.get::<_, i64>(3)?,
                "startTime": r.get::<_, String>(4)?,
                "endTime": r.get::<_, String>(5)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(classes::query_failed)?;

    Ok(json!({
        "teacherId": p.teacher_id,
        "teacherName": teacher_name,
        "entries": entries,
    }))
}

fn with_db(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.generate" => Some(with_db(state, req, timetable_generate)),
        "timetable.forClass" => Some(with_db(state, req, timetable_for_class)),
        "timetable.forTeacher" => Some(with_db(state, req, timetable_for_teacher)),
        _ => None,
    }
}
