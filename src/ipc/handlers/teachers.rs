use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::timetable;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

fn bad_params(message: impl Into<String>) -> HandlerErr {
    HandlerErr {
        code: "bad_params",
        message: message.into(),
        details: None,
    }
}

fn query_failed(e: rusqlite::Error) -> HandlerErr {
    HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    }
}

fn update_failed(e: rusqlite::Error, table: &str) -> HandlerErr {
    HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": table })),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: &serde_json::Value) -> Result<T, HandlerErr> {
    let value = if params.is_null() {
        json!({})
    } else {
        params.clone()
    };
    serde_json::from_value(value).map_err(|e| bad_params(e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTeacherParams {
    name: String,
    email: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    class_number: Option<u32>,
    #[serde(default)]
    phone: Option<String>,
}

fn teachers_add(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let p: AddTeacherParams = parse_params(params)?;
    let name = p.name.trim().to_string();
    let email = p.email.trim().to_lowercase();
    if name.is_empty() {
        return Err(bad_params("name must not be blank"));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(bad_params("email must be a plausible address"));
    }
    if let Some(c) = p.class_number {
        if c < 1 || c > timetable::CLASS_NUMBER_MAX {
            return Err(bad_params(format!(
                "classNumber must be between 1 and {}",
                timetable::CLASS_NUMBER_MAX
            )));
        }
    }

    let taken: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE email = ?", [&email], |r| r.get(0))
        .optional()
        .map_err(query_failed)?;
    if taken.is_some() {
        return Err(HandlerErr {
            code: "conflict",
            message: "email already exists".to_string(),
            details: None,
        });
    }

    let subject_tag = p
        .subject
        .as_deref()
        .map(timetable::normalize_subject)
        .filter(|s| !s.is_empty());
    let secret = p.password.as_deref().unwrap_or(timetable::DEFAULT_CREDENTIAL);
    let id = Uuid::new_v4().to_string();
    let seq = db::next_user_seq(conn).map_err(query_failed)?;

    // Admin-added teachers are auto-verified, matching the admin panel flow.
    conn.execute(
        "INSERT INTO users(id, seq, name, email, credential_digest, role, subject,
                           class_assigned, verified, is_approved, academic_year, phone, created_at)
         VALUES(?, ?, ?, ?, ?, 'teacher', ?, ?, 1, 1, ?, ?, ?)",
        params![
            id,
            seq,
            name,
            email,
            timetable::credential_digest(secret),
            subject_tag,
            p.class_number,
            db::current_academic_year(),
            p.phone,
            db::now_rfc3339()
        ],
    )
    .map_err(|e| update_failed(e, "users"))?;

    Ok(json!({ "id": id, "seq": seq }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTeachersParams {
    #[serde(default)]
    subject: Option<String>,
}

fn teachers_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let p: ListTeachersParams = parse_params(params)?;
    let subject_filter = p
        .subject
        .as_deref()
        .map(timetable::normalize_subject)
        .filter(|s| !s.is_empty());

    // Newest-first, the order the admin panel shows.
    let sql = "SELECT id, name, email, subject, class_assigned, employee_id,
                      verified, is_approved, academic_year, created_at
               FROM users
               WHERE role = 'teacher' AND (?1 IS NULL OR subject = ?1)
               ORDER BY seq DESC";
    let mut stmt = conn.prepare(sql).map_err(query_failed)?;
    let rows = stmt
        .query_map([&subject_filter], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "email": r.get::<_, String>(2)?,
                "subject": r.get::<_, Option<String>>(3)?,
                "classAssigned": r.get::<_, Option<i64>>(4)?,
                "employeeId": r.get::<_, Option<String>>(5)?,
                "verified": r.get::<_, i64>(6)? != 0,
                "isApproved": r.get::<_, i64>(7)? != 0,
                "academicYear": r.get::<_, Option<String>>(8)?,
                "createdAt": r.get::<_, String>(9)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(query_failed)?;

    Ok(json!({ "teachers": rows }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignClassParams {
    teacher_id: String,
    class_number: u32,
}

fn teachers_assign_class(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let p: AssignClassParams = parse_params(params)?;
    if p.class_number < 1 || p.class_number > timetable::CLASS_NUMBER_MAX {
        return Err(bad_params(format!(
            "classNumber must be between 1 and {}",
            timetable::CLASS_NUMBER_MAX
        )));
    }

    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM users WHERE id = ? AND role = 'teacher'",
            [&p.teacher_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(query_failed)?;
    if exists.is_none() {
        return Err(HandlerErr {
            code: "not_found",
            message: "teacher not found".to_string(),
            details: None,
        });
    }

    conn.execute(
        "UPDATE users SET verified = 1, class_assigned = ? WHERE id = ?",
        params![p.class_number, p.teacher_id],
    )
    .map_err(|e| update_failed(e, "users"))?;

    let academic_year = db::current_academic_year();
    let class_id = timetable::upsert_class_row(conn, p.class_number, &academic_year)
        .map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "classes" })),
        })?;
    conn.execute(
        "UPDATE classes SET class_teacher = ? WHERE id = ?",
        params![p.teacher_id, class_id],
    )
    .map_err(|e| update_failed(e, "classes"))?;

    Ok(json!({ "classId": class_id }))
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
        "teachers.add" => Some(with_db(state, req, teachers_add)),
        "teachers.list" => Some(with_db(state, req, teachers_list)),
        "teachers.assignClass" => Some(with_db(state, req, teachers_assign_class)),
        _ => None,
    }
}
