use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::json;

pub(super) struct HandlerErr {
    pub(super) code: &'static str,
    pub(super) message: String,
    pub(super) details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub(super) fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub(super) fn query_failed(e: rusqlite::Error) -> HandlerErr {
    HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    }
}

#[derive(Debug, Clone)]
pub(super) struct ClassRow {
    pub(super) id: String,
    pub(super) class_number: i64,
    pub(super) section: String,
    pub(super) name: String,
    pub(super) academic_year: String,
    pub(super) class_teacher: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ClassLookupParams {
    pub(super) class_number: u32,
    #[serde(default)]
    pub(super) section: Option<String>,
    #[serde(default)]
    pub(super) academic_year: Option<String>,
}

pub(super) fn find_class(
    conn: &Connection,
    p: &ClassLookupParams,
) -> Result<Option<ClassRow>, HandlerErr> {
    let section = p
        .section
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase);
    conn.query_row(
        "SELECT id, class_number, section, name, academic_year, class_teacher
         FROM classes
         WHERE class_number = ?1
           AND (?2 IS NULL OR section = ?2)
           AND (?3 IS NULL OR academic_year = ?3)
         ORDER BY rowid LIMIT 1",
        (&p.class_number, &section, &p.academic_year),
        |r| {
            Ok(ClassRow {
                id: r.get(0)?,
                class_number: r.get(1)?,
                section: r.get(2)?,
                name: r.get(3)?,
                academic_year: r.get(4)?,
                class_teacher: r.get(5)?,
            })
        },
    )
    .optional()
    .map_err(query_failed)
}

/// The per-class subject/schedule table, position-ordered. Shared with the
/// timetable view handler.
pub(super) fn subjects_table_json(
    conn: &Connection,
    class_id: &str,
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT cs.position, cs.subject_id, s.name, cs.teacher_id, cs.academic_year
             FROM class_subjects cs
             JOIN subjects s ON s.id = cs.subject_id
             WHERE cs.class_id = ?
             ORDER BY cs.position",
        )
        .map_err(query_failed)?;
    let lessons = stmt
        .query_map([class_id], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, Option<String>>(3)?,
                r.get::<_, String>(4)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(query_failed)?;

    let mut slot_stmt = conn
        .prepare(
            "SELECT day, start_time, end_time, room
             FROM class_subject_slots
             WHERE class_id = ? AND position = ?
             ORDER BY rowid",
        )
        .map_err(query_failed)?;

    let mut out = Vec::with_capacity(lessons.len());
    for (position, subject_id, subject_name, teacher_id, academic_year) in lessons {
        let schedule = slot_stmt
            .query_map((class_id, position), |r| {
                Ok(json!({
                    "day": r.get::<_, String>(0)?,
                    "startTime": r.get::<_, String>(1)?,
                    "endTime": r.get::<_, String>(2)?,
                    "room": r.get::<_, Option<String>>(3)?,
                }))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(query_failed)?;
        out.push(json!({
            "position": position,
            "subjectId": subject_id,
            "subjectName": subject_name,
            "teacherId": teacher_id,
            "academicYear": academic_year,
            "schedule": schedule,
        }));
    }
    Ok(out)
}

fn classes_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT c.id, c.class_number, c.section, c.name, c.academic_year, c.class_teacher,
                    (SELECT COUNT(*) FROM class_subjects cs WHERE cs.class_id = c.id)
             FROM classes c
             ORDER BY c.class_number, c.section",
        )
        .map_err(query_failed)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "classNumber": r.get::<_, i64>(1)?,
                "section": r.get::<_, String>(2)?,
                "name": r.get::<_, String>(3)?,
                "academicYear": r.get::<_, String>(4)?,
                "classTeacherId": r.get::<_, Option<String>>(5)?,
                "subjectCount": r.get::<_, i64>(6)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(query_failed)?;
    Ok(json!({ "classes": rows }))
}

fn classes_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let p: ClassLookupParams = serde_json::from_value(params.clone()).map_err(|e| HandlerErr {
        code: "bad_params",
        message: e.to_string(),
        details: None,
    })?;
    let Some(class) = find_class(conn, &p)? else {
        return Err(HandlerErr {
            code: "not_found",
            message: "class not found".to_string(),
            details: None,
        });
    };
    let subjects = subjects_table_json(conn, &class.id)?;
    Ok(json!({
        "id": class.id,
        "classNumber": class.class_number,
        "section": class.section,
        "name": class.name,
        "academicYear": class.academic_year,
        "classTeacherId": class.class_teacher,
        "subjects": subjects,
    }))
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match classes_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_classes_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match classes_get(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.get" => Some(handle_classes_get(state, req)),
        _ => None,
    }
}
