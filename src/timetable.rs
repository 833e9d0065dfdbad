use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::db;

/// Highest grade level a roster may carry.
pub const CLASS_NUMBER_MAX: u32 = 12;

/// Shared placeholder credential issued to synthesized teacher accounts.
/// Credential policy itself lives with the auth collaborator, not here.
pub const DEFAULT_CREDENTIAL: &str = "123456";

pub const DEFAULT_SUBJECTS: [&str; 5] = [
    "English",
    "Mathematics",
    "Science",
    "Social Studies",
    "Hindi",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
        }
    }

    /// Three-letter code used by the per-teacher weekly view.
    pub fn short(self) -> &'static str {
        match self {
            Weekday::Monday => "Mon",
            Weekday::Tuesday => "Tue",
            Weekday::Wednesday => "Wed",
            Weekday::Thursday => "Thu",
            Weekday::Friday => "Fri",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeSlot {
    pub start: String,
    pub end: String,
}

fn default_time_slots() -> Vec<TimeSlot> {
    // Five 45-minute periods, 09:00-14:15, with a lunch gap before the last.
    [
        ("09:00", "09:45"),
        ("10:00", "10:45"),
        ("11:00", "11:45"),
        ("12:00", "12:45"),
        ("13:30", "14:15"),
    ]
    .iter()
    .map(|(s, e)| TimeSlot {
        start: (*s).to_string(),
        end: (*e).to_string(),
    })
    .collect()
}

/// Validated generator input. All fields have defaults, so an empty params
/// object runs the standard 12-class, 5-subject configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimetableConfig {
    pub class_range: (u32, u32),
    pub subjects: Vec<String>,
    pub max_classes_per_teacher: u32,
    pub time_slots: Vec<TimeSlot>,
    pub weekdays: Vec<Weekday>,
}

impl Default for TimetableConfig {
    fn default() -> Self {
        TimetableConfig {
            class_range: (1, CLASS_NUMBER_MAX),
            subjects: DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect(),
            max_classes_per_teacher: 5,
            time_slots: default_time_slots(),
            weekdays: Weekday::ALL.to_vec(),
        }
    }
}

impl TimetableConfig {
    pub fn class_count(&self) -> u32 {
        self.class_range.1 - self.class_range.0 + 1
    }

    /// Fails fast, before any store write.
    pub fn validate(&self) -> Result<(), GenerateError> {
        let (min, max) = self.class_range;
        if min < 1 || max > CLASS_NUMBER_MAX || min > max {
            return Err(GenerateError::Config(format!(
                "classRange must satisfy 1 <= min <= max <= {}, got [{}, {}]",
                CLASS_NUMBER_MAX, min, max
            )));
        }
        if self.subjects.is_empty() {
            return Err(GenerateError::Config("subjects must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for raw in &self.subjects {
            let name = normalize_subject(raw);
            if !name.is_empty() && !seen.insert(name) {
                return Err(GenerateError::Config(format!(
                    "duplicate subject name: {}",
                    raw.trim()
                )));
            }
        }
        if self.max_classes_per_teacher < 1 {
            return Err(GenerateError::Config(
                "maxClassesPerTeacher must be at least 1".into(),
            ));
        }
        if self.time_slots.len() < self.subjects.len() {
            return Err(GenerateError::Config(format!(
                "need at least {} time slots for {} subjects, got {}",
                self.subjects.len(),
                self.subjects.len(),
                self.time_slots.len()
            )));
        }
        for slot in &self.time_slots {
            if parse_hhmm(&slot.start).is_none() || parse_hhmm(&slot.end).is_none() {
                return Err(GenerateError::Config(format!(
                    "time slot {}-{} is not HH:MM",
                    slot.start, slot.end
                )));
            }
        }
        if self.weekdays.is_empty() {
            return Err(GenerateError::Config("weekdays must not be empty".into()));
        }
        let mut days = HashSet::new();
        for day in &self.weekdays {
            if !days.insert(*day) {
                return Err(GenerateError::Config(format!(
                    "duplicate weekday: {}",
                    day.name()
                )));
            }
        }
        Ok(())
    }
}

fn parse_hhmm(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour < 24 && minute < 60 {
        Some((hour, minute))
    } else {
        None
    }
}

/// Subject identity is case-normalized; specialty tags and schedule entries
/// use the same form so pool lookups and the two timetable views agree.
pub fn normalize_subject(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[derive(Debug)]
pub enum GenerateError {
    Config(String),
    Store(rusqlite::Error),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            GenerateError::Store(e) => write!(f, "store failure: {}", e),
        }
    }
}

impl std::error::Error for GenerateError {}

impl From<rusqlite::Error> for GenerateError {
    fn from(e: rusqlite::Error) -> Self {
        GenerateError::Store(e)
    }
}

/// `ceil(classes / cap)` teachers cover a subject across the class range.
pub fn required_teachers(class_count: u32, max_classes_per_teacher: u32) -> u32 {
    (class_count + max_classes_per_teacher - 1) / max_classes_per_teacher
}

/// Block partition over the class range: classes 1..=cap share block 0,
/// cap+1..=2*cap block 1, and so on.
pub fn block_index(class_number: u32, max_classes_per_teacher: u32) -> usize {
    ((class_number - 1) / max_classes_per_teacher) as usize
}

/// Rolling diagonal. For a fixed class the subject->slot map is a bijection
/// over [0, slot_count) whenever slot_count >= number of subjects, and the
/// same subject rotates through different slots across classes.
pub fn assign_slot(subject_index: usize, class_number: u32, slot_count: usize) -> usize {
    let s = subject_index as i64;
    let c = i64::from(class_number);
    let n = slot_count as i64;
    (((s - c) % n + n) % n) as usize
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeacherRecord {
    pub id: String,
    pub name: String,
    pub seq: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectRecord {
    pub id: String,
    pub name: String,
}

/// A subject with its teacher pool, oldest-first. The pool ordering is
/// load-bearing: the allocator indexes into it by block.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectPool {
    pub subject: SubjectRecord,
    pub teachers: Vec<TeacherRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lesson {
    pub position: usize,
    pub subject_id: String,
    pub subject_name: String,
    pub teacher_id: String,
    pub slot: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassPlan {
    pub class_number: u32,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub teachers_per_subject: u32,
    pub teachers_created: usize,
    pub classes_processed: usize,
    pub entries_written: usize,
    pub skipped: Vec<String>,
}

/// Phase 1: the complete target allocation, computed before anything is
/// written. Both denormalized views are later derived from this one plan, so
/// they cannot drift from each other.
pub fn build_plan(config: &TimetableConfig, pools: &[SubjectPool]) -> Vec<ClassPlan> {
    let slot_count = config.time_slots.len();
    let (min, max) = config.class_range;
    let mut plan = Vec::with_capacity((max - min + 1) as usize);
    for class_number in min..=max {
        let block = block_index(class_number, config.max_classes_per_teacher);
        let mut lessons = Vec::with_capacity(pools.len());
        for (position, pool) in pools.iter().enumerate() {
            // Blocks beyond the pool size wrap around: intentional
            // overflow-sharing, not a failure.
            let teacher = &pool.teachers[block % pool.teachers.len()];
            lessons.push(Lesson {
                position,
                subject_id: pool.subject.id.clone(),
                subject_name: pool.subject.name.clone(),
                teacher_id: teacher.id.clone(),
                slot: assign_slot(position, class_number, slot_count),
            });
        }
        plan.push(ClassPlan {
            class_number,
            lessons,
        });
    }
    plan
}

/// Runs the whole generator: validate, provision, plan, apply. Provisioning
/// and the apply phase share one transaction, so a store failure anywhere
/// rolls the workspace back to its pre-run state.
pub fn generate(
    conn: &Connection,
    config: &TimetableConfig,
) -> Result<SummaryReport, GenerateError> {
    config.validate()?;
    let academic_year = db::current_academic_year();
    let required = required_teachers(config.class_count(), config.max_classes_per_teacher);

    let tx = conn.unchecked_transaction()?;

    let mut skipped = Vec::new();
    let mut teachers_created = 0usize;
    let mut pools = Vec::new();
    for raw in &config.subjects {
        let display = raw.trim();
        if display.is_empty() {
            skipped.push("blank subject name in configuration; pairs skipped".to_string());
            continue;
        }
        let subject = ensure_subject(&tx, display)?;
        let teachers = ensure_teachers(
            &tx,
            &subject.name,
            display,
            required,
            &academic_year,
            &mut teachers_created,
        )?;
        pools.push(SubjectPool { subject, teachers });
    }

    let plan = build_plan(config, &pools);
    let entries_written = apply_plan(&tx, config, &academic_year, &plan)?;

    tx.commit()?;

    Ok(SummaryReport {
        teachers_per_subject: required,
        teachers_created,
        classes_processed: plan.len(),
        entries_written,
        skipped,
    })
}

/// Lazily creates the Subject record for a configured name. Existing records
/// are immutable for this subsystem.
pub fn ensure_subject(conn: &Connection, display: &str) -> Result<SubjectRecord, GenerateError> {
    let name = normalize_subject(display);
    let existing = conn
        .query_row(
            "SELECT id, name FROM subjects WHERE name = ?",
            [&name],
            |r| {
                Ok(SubjectRecord {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            },
        )
        .optional()?;
    if let Some(rec) = existing {
        return Ok(rec);
    }

    let code = generate_subject_code(conn, &name)?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, name, code, description, created_at)
         VALUES(?, ?, ?, ?, ?)",
        params![
            id,
            name,
            code,
            format!("Subject {}", display),
            db::now_rfc3339()
        ],
    )?;
    Ok(SubjectRecord { id, name })
}

/// Short code: 3-letter prefix plus the first free 3-digit number.
pub fn generate_subject_code(conn: &Connection, name: &str) -> Result<String, GenerateError> {
    let prefix: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let mut n = 100u32;
    loop {
        let code = format!("{}{}", prefix, n);
        let taken: Option<i64> = conn
            .query_row("SELECT 1 FROM subjects WHERE code = ?", [&code], |r| {
                r.get(0)
            })
            .optional()?;
        if taken.is_none() {
            return Ok(code);
        }
        n += 1;
    }
}

/// Teacher Provisioner. Returns pre-existing teachers (seq ascending) followed
/// by any synthesized shortfall, in creation order. Existing records are never
/// mutated or deleted.
pub fn ensure_teachers(
    conn: &Connection,
    subject_tag: &str,
    display: &str,
    required: u32,
    academic_year: &str,
    created: &mut usize,
) -> Result<Vec<TeacherRecord>, GenerateError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, seq FROM users
         WHERE role = 'teacher' AND subject = ?
         ORDER BY seq",
    )?;
    let mut pool = stmt
        .query_map([subject_tag], |r| {
            Ok(TeacherRecord {
                id: r.get(0)?,
                name: r.get(1)?,
                seq: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let have = pool.len();
    for i in have..required as usize {
        let n = i + 1;
        let id = Uuid::new_v4().to_string();
        let seq = db::next_user_seq(conn)?;
        let name = format!("{} Teacher {}", display, n);
        let email = unique_teacher_email(conn, display, n)?;
        let employee_prefix: String = subject_tag
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(2)
            .collect();
        conn.execute(
            "INSERT INTO users(id, seq, name, email, credential_digest, role, subject,
                               employee_id, verified, is_approved, academic_year, phone, created_at)
             VALUES(?, ?, ?, ?, ?, 'teacher', ?, ?, 1, 1, ?, '0000000000', ?)",
            params![
                id,
                seq,
                name,
                email,
                credential_digest(DEFAULT_CREDENTIAL),
                subject_tag,
                format!("T{}{}{:03}", employee_prefix, n, seq % 1000),
                academic_year,
                db::now_rfc3339()
            ],
        )?;
        pool.push(TeacherRecord { id, name, seq });
        *created += 1;
    }
    Ok(pool)
}

fn unique_teacher_email(
    conn: &Connection,
    display: &str,
    n: usize,
) -> Result<String, GenerateError> {
    let tag: String = display
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let mut suffix = (Utc::now().timestamp_millis() % 10_000) as u32;
    for _ in 0..10_000 {
        let email = format!("teacher.{}{}{:04}@school.local", tag, n, suffix);
        let taken: Option<i64> = conn
            .query_row("SELECT 1 FROM users WHERE email = ?", [&email], |r| {
                r.get(0)
            })
            .optional()?;
        if taken.is_none() {
            return Ok(email);
        }
        suffix = (suffix + 1) % 10_000;
    }
    // 10k collisions on one name: fall back to an id-based address.
    Ok(format!(
        "teacher.{}{}.{}@school.local",
        tag,
        n,
        Uuid::new_v4()
    ))
}

pub fn credential_digest(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Phase 2: one logical write phase inside the caller's transaction. Wipes
/// the per-teacher view and the assignment set, then rewrites both views and
/// the per-class subject tables from the plan.
fn apply_plan(
    conn: &Connection,
    config: &TimetableConfig,
    academic_year: &str,
    plan: &[ClassPlan],
) -> Result<usize, GenerateError> {
    conn.execute("DELETE FROM schedule_entries", [])?;
    conn.execute("DELETE FROM teacher_assignments", [])?;

    let mut entries_written = 0usize;
    for class_plan in plan {
        let class_id = upsert_class_row(conn, class_plan.class_number, academic_year)?;
        conn.execute(
            "DELETE FROM class_subject_slots WHERE class_id = ?",
            [&class_id],
        )?;
        conn.execute("DELETE FROM class_subjects WHERE class_id = ?", [&class_id])?;

        let room = format!("Room {}", class_plan.class_number);
        for lesson in &class_plan.lessons {
            let slot = &config.time_slots[lesson.slot];
            conn.execute(
                "INSERT INTO class_subjects(class_id, position, subject_id, teacher_id, academic_year)
                 VALUES(?, ?, ?, ?, ?)",
                params![
                    class_id,
                    lesson.position as i64,
                    lesson.subject_id,
                    lesson.teacher_id,
                    academic_year
                ],
            )?;
            for day in &config.weekdays {
                conn.execute(
                    "INSERT INTO class_subject_slots(class_id, position, day, start_time, end_time, room)
                     VALUES(?, ?, ?, ?, ?, ?)",
                    params![
                        class_id,
                        lesson.position as i64,
                        day.name(),
                        slot.start,
                        slot.end,
                        room
                    ],
                )?;
                entries_written += conn.execute(
                    "INSERT OR IGNORE INTO schedule_entries(teacher_id, day, class_number, subject, period, start_time, end_time)
                     VALUES(?, ?, ?, ?, ?, ?, ?)",
                    params![
                        lesson.teacher_id,
                        day.short(),
                        class_plan.class_number,
                        lesson.subject_name,
                        (lesson.slot + 1) as i64,
                        slot.start,
                        slot.end
                    ],
                )?;
            }
            conn.execute(
                "INSERT OR IGNORE INTO teacher_assignments(teacher_id, class_id, subject_id, academic_year)
                 VALUES(?, ?, ?, ?)",
                params![lesson.teacher_id, class_id, lesson.subject_id, academic_year],
            )?;
        }
    }
    Ok(entries_written)
}

pub fn upsert_class_row(
    conn: &Connection,
    class_number: u32,
    academic_year: &str,
) -> Result<String, GenerateError> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM classes WHERE class_number = ? ORDER BY rowid LIMIT 1",
            [class_number],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, class_number, section, name, academic_year)
         VALUES(?, ?, 'A', ?, ?)",
        params![
            id,
            class_number,
            format!("Class {}", class_number),
            academic_year
        ],
    )?;
    Ok(id)
}
