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

fn query_failed(e: rusqlite::Error) -> HandlerErr {
    HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSubjectParams {
    name: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

fn subjects_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let p: CreateSubjectParams =
        serde_json::from_value(params.clone()).map_err(|e| HandlerErr {
            code: "bad_params",
            message: e.to_string(),
            details: None,
        })?;
    let name = timetable::normalize_subject(&p.name);
    if name.is_empty() {
        return Err(HandlerErr {
            code: "bad_params",
            message: "name must not be blank".to_string(),
            details: None,
        });
    }

    let taken: Option<i64> = conn
        .query_row("SELECT 1 FROM subjects WHERE name = ?", [&name], |r| {
            r.get(0)
        })
        .optional()
        .map_err(query_failed)?;
    if taken.is_some() {
        return Err(HandlerErr {
            code: "conflict",
            message: "subject already exists".to_string(),
            details: None,
        });
    }

    let code = match p.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => {
            let code = c.to_uppercase();
            let code_taken: Option<i64> = conn
                .query_row("SELECT 1 FROM subjects WHERE code = ?", [&code], |r| {
                    r.get(0)
                })
                .optional()
                .map_err(query_failed)?;
            if code_taken.is_some() {
                return Err(HandlerErr {
                    code: "conflict",
                    message: "subject code already exists".to_string(),
                    details: None,
                });
            }
            code
        }
        None => timetable::generate_subject_code(conn, &name).map_err(|e| HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        })?,
    };

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, name, code, description, created_at)
         VALUES(?, ?, ?, ?, ?)",
        params![
            id,
            name,
            code,
            p.description.as_deref().map(str::trim),
            db::now_rfc3339()
        ],
    )
    .map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "subjects" })),
    })?;

    Ok(json!({ "id": id, "name": name, "code": code }))
}

fn subjects_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT id, name, code, description FROM subjects ORDER BY name")
        .map_err(query_failed)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "code": r.get::<_, String>(2)?,
                "description": r.get::<_, Option<String>>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(query_failed)?;
    Ok(json!({ "subjects": rows }))
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match subjects_create(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match subjects_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.list" => Some(handle_subjects_list(state, req)),
        _ => None,
    }
}
