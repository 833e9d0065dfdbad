use chrono::{Datelike, Local, Utc};
use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("school.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            seq INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            credential_digest TEXT NOT NULL,
            role TEXT NOT NULL,
            subject TEXT,
            class_assigned INTEGER,
            employee_id TEXT,
            verified INTEGER NOT NULL DEFAULT 0,
            is_approved INTEGER NOT NULL DEFAULT 0,
            academic_year TEXT,
            phone TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_role_subject ON users(role, subject)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_seq ON users(seq)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            code TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            class_number INTEGER NOT NULL,
            section TEXT NOT NULL DEFAULT 'A',
            name TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            class_teacher TEXT,
            UNIQUE(class_number, section, academic_year),
            FOREIGN KEY(class_teacher) REFERENCES users(id)
        )",
        [],
    )?;

    // Per-class subject table: one row per (class, position), plus one slot
    // row per weekday. Rewritten wholesale by the timetable generator.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_subjects(
            class_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            subject_id TEXT NOT NULL,
            teacher_id TEXT,
            academic_year TEXT NOT NULL,
            PRIMARY KEY(class_id, position),
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(teacher_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_subject_slots(
            class_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            day TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            room TEXT,
            PRIMARY KEY(class_id, position, day),
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_class_subjects_teacher ON class_subjects(teacher_id)",
        [],
    )?;

    // assignedClasses as a relation with set semantics: the UNIQUE constraint
    // plus INSERT OR IGNORE gives $addToSet-style dedup inserts.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_assignments(
            teacher_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            UNIQUE(teacher_id, class_id, subject_id, academic_year),
            FOREIGN KEY(teacher_id) REFERENCES users(id),
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;

    // Per-teacher weekly view. One logical schedule per teacher, stored flat;
    // the full-tuple UNIQUE constraint enforces entry-set semantics.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule_entries(
            teacher_id TEXT NOT NULL,
            day TEXT NOT NULL,
            class_number INTEGER NOT NULL,
            subject TEXT NOT NULL,
            period INTEGER NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            UNIQUE(teacher_id, day, class_number, subject, period, start_time, end_time),
            FOREIGN KEY(teacher_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedule_entries_teacher ON schedule_entries(teacher_id)",
        [],
    )?;

    Ok(conn)
}

/// Explicit creation-order sort key for users. The teacher pool ordering the
/// allocator depends on must not ride on store-assigned timestamps, which can
/// tie within one millisecond.
pub fn next_user_seq(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM users", [], |r| {
        r.get(0)
    })
}

/// Academic year label in the catalog's "YYYY-YYYY" form, derived from the
/// current calendar year.
pub fn current_academic_year() -> String {
    let year = Local::now().year();
    format!("{}-{}", year, year + 1)
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

#[allow(dead_code)]
pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
