use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::course::{copy_name, copy_prefix, validate_name};
use crate::models::partner::PartnerRow;
use crate::models::session::SessionRow;
use crate::models::{
    Course, CourseDetail, NewCourseRequest, NewPartnerRequest, NewSessionRequest, NewUserRequest,
    Partner, Session, UpdateCourseRequest, UpdateSessionRequest, User,
};

const SESSION_COLUMNS: &str = "id, name, start_date, duration, end_date, seats, active, \
    instructor_id, course_id, attendees_count, color, updated_at";

pub async fn fetch_users(db: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT id, name, login FROM users ORDER BY name, id")
        .fetch_all(db)
        .await
}

pub async fn insert_user(db: &SqlitePool, req: NewUserRequest) -> Result<User, AppError> {
    validate_name(&req.name)?;
    let id = Uuid::new_v4().to_string();

    sqlx::query("INSERT INTO users (id, name, login) VALUES (?1, ?2, ?3)")
        .bind(&id)
        .bind(&req.name)
        .bind(&req.login)
        .execute(db)
        .await?;

    Ok(User {
        id,
        name: req.name,
        login: req.login,
    })
}

/// Courses the user was responsible for keep existing with no responsible.
pub async fn delete_user(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    if result > 0 {
        info!("deleted user {}", id);
    }
    Ok(result > 0)
}

async fn fetch_category_map(
    executor: impl SqliteExecutor<'_>,
) -> Result<HashMap<String, BTreeSet<String>>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT partner_id, name FROM partner_categories",
    )
    .fetch_all(executor)
    .await?;

    let mut categories: HashMap<String, BTreeSet<String>> = HashMap::new();
    for (partner_id, name) in rows {
        categories.entry(partner_id).or_default().insert(name);
    }
    Ok(categories)
}

pub async fn fetch_partners(db: &SqlitePool) -> Result<Vec<Partner>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PartnerRow>(
        "SELECT id, name, is_instructor FROM partners ORDER BY name, id",
    )
    .fetch_all(db)
    .await?;

    let mut categories = fetch_category_map(db).await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let own = categories.remove(&row.id).unwrap_or_default();
            row.into_partner(own)
        })
        .collect())
}

/// Partners offered when picking a session instructor. This is a picker
/// filter only; commits accept any partner as instructor.
pub async fn fetch_instructor_candidates(db: &SqlitePool) -> Result<Vec<Partner>, sqlx::Error> {
    Ok(fetch_partners(db)
        .await?
        .into_iter()
        .filter(|p| p.is_instructor_candidate())
        .collect())
}

pub async fn find_partner_by_id(db: &SqlitePool, id: &str) -> Result<Option<Partner>, sqlx::Error> {
    let Some(row) = sqlx::query_as::<_, PartnerRow>(
        "SELECT id, name, is_instructor FROM partners WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?
    else {
        return Ok(None);
    };

    let categories: BTreeSet<String> = sqlx::query_scalar::<_, String>(
        "SELECT name FROM partner_categories WHERE partner_id = ?1",
    )
    .bind(id)
    .fetch_all(db)
    .await?
    .into_iter()
    .collect();

    Ok(Some(row.into_partner(categories)))
}

pub async fn insert_partner(db: &SqlitePool, req: NewPartnerRequest) -> Result<Partner, AppError> {
    validate_name(&req.name)?;
    let id = Uuid::new_v4().to_string();

    let mut tx = db.begin().await?;

    sqlx::query("INSERT INTO partners (id, name, is_instructor) VALUES (?1, ?2, ?3)")
        .bind(&id)
        .bind(&req.name)
        .bind(req.is_instructor)
        .execute(&mut *tx)
        .await?;

    for category in &req.categories {
        sqlx::query("INSERT INTO partner_categories (partner_id, name) VALUES (?1, ?2)")
            .bind(&id)
            .bind(category)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(Partner {
        id,
        name: req.name,
        is_instructor: req.is_instructor,
        categories: req.categories,
    })
}

/// Removes the partner everywhere it is referenced: instructor links are
/// cleared by the schema and attendee links are dropped, after which the
/// stored attendee counts of the touched sessions are refreshed.
pub async fn delete_partner(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let mut tx = db.begin().await?;

    let affected = sqlx::query_scalar::<_, String>(
        "SELECT session_id FROM session_attendees WHERE partner_id = ?1",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let deleted = sqlx::query("DELETE FROM partners WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let now = Utc::now().to_rfc3339();
    for session_id in &affected {
        sqlx::query(
            r#"
            UPDATE sessions
            SET attendees_count = (SELECT COUNT(*) FROM session_attendees WHERE session_id = ?1),
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(session_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    if deleted > 0 {
        info!("deleted partner {} ({} sessions refreshed)", id, affected.len());
    }
    Ok(deleted > 0)
}

pub async fn fetch_courses(db: &SqlitePool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "SELECT id, name, description, responsible_id, updated_at FROM courses ORDER BY name, id",
    )
    .fetch_all(db)
    .await
}

async fn load_course(
    executor: impl SqliteExecutor<'_>,
    id: &str,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "SELECT id, name, description, responsible_id, updated_at FROM courses WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn find_course_by_id(
    db: &SqlitePool,
    id: &str,
) -> Result<Option<CourseDetail>, sqlx::Error> {
    let Some(course) = load_course(db, id).await? else {
        return Ok(None);
    };

    let session_ids = sqlx::query_scalar::<_, String>(
        "SELECT id FROM sessions WHERE course_id = ?1 ORDER BY name, id",
    )
    .bind(id)
    .fetch_all(db)
    .await?;

    Ok(Some(CourseDetail {
        course,
        session_ids,
    }))
}

async fn insert_course_row(
    executor: impl SqliteExecutor<'_>,
    course: &Course,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO courses (id, name, description, responsible_id, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&course.id)
    .bind(&course.name)
    .bind(&course.description)
    .bind(&course.responsible_id)
    .bind(&course.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn insert_course(db: &SqlitePool, req: NewCourseRequest) -> Result<Course, AppError> {
    let course = Course {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        description: req.description,
        responsible_id: req.responsible_id,
        updated_at: Utc::now().to_rfc3339(),
    };
    course.validate()?;

    insert_course_row(db, &course).await?;
    info!("created course {} ({})", course.name, course.id);

    Ok(course)
}

pub async fn update_course(
    db: &SqlitePool,
    id: &str,
    req: UpdateCourseRequest,
) -> Result<Option<Course>, AppError> {
    let mut tx = db.begin().await?;

    let Some(mut current) = load_course(&mut *tx, id).await? else {
        return Ok(None);
    };

    if let Some(name) = req.name {
        current.name = name;
    }
    if let Some(description) = req.description {
        current.description = description;
    }
    if let Some(responsible_id) = req.responsible_id {
        current.responsible_id = responsible_id;
    }
    current.updated_at = Utc::now().to_rfc3339();
    current.validate()?;

    sqlx::query(
        r#"
        UPDATE courses
        SET name = ?1,
            description = ?2,
            responsible_id = ?3,
            updated_at = ?4
        WHERE id = ?5
        "#,
    )
    .bind(&current.name)
    .bind(&current.description)
    .bind(&current.responsible_id)
    .bind(&current.updated_at)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(current))
}

/// Fails with a foreign-key violation while sessions still reference the
/// course.
pub async fn delete_course(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM courses WHERE id = ?1")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

/// Number of courses whose name starts with `"Copy of " + name`, compared
/// case-sensitively.
pub async fn count_course_copies(
    executor: impl SqliteExecutor<'_>,
    name: &str,
) -> Result<i64, sqlx::Error> {
    let prefix = copy_prefix(name);

    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE substr(name, 1, ?1) = ?2")
        .bind(prefix.chars().count() as i64)
        .bind(&prefix)
        .fetch_one(executor)
        .await
}

/// Duplicates a course under a fresh "Copy of ..." name. Sessions stay with
/// the original.
pub async fn copy_course(db: &SqlitePool, id: &str) -> Result<Option<Course>, AppError> {
    let mut tx = db.begin().await?;

    let Some(original) = load_course(&mut *tx, id).await? else {
        return Ok(None);
    };

    let copies = count_course_copies(&mut *tx, &original.name).await?;
    let copy = Course {
        id: Uuid::new_v4().to_string(),
        name: copy_name(&original.name, copies),
        description: original.description.clone(),
        responsible_id: original.responsible_id.clone(),
        updated_at: Utc::now().to_rfc3339(),
    };
    copy.validate()?;

    insert_course_row(&mut *tx, &copy).await?;
    tx.commit().await?;

    info!("duplicated course {} as {}", original.name, copy.name);
    Ok(Some(copy))
}

async fn load_attendees(
    executor: impl SqliteExecutor<'_>,
    session_id: &str,
) -> Result<BTreeSet<String>, sqlx::Error> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT partner_id FROM session_attendees WHERE session_id = ?1",
    )
    .bind(session_id)
    .fetch_all(executor)
    .await?;

    Ok(ids.into_iter().collect())
}

async fn load_session(conn: &mut SqliteConnection, id: &str) -> Result<Option<Session>, sqlx::Error> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
    let Some(row) = sqlx::query_as::<_, SessionRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let attendees = load_attendees(&mut *conn, &row.id).await?;
    Ok(Some(row.into_session(attendees)))
}

pub async fn find_session_by_id(db: &SqlitePool, id: &str) -> Result<Option<Session>, sqlx::Error> {
    let mut conn = db.acquire().await?;
    load_session(&mut conn, id).await
}

pub async fn fetch_sessions(
    db: &SqlitePool,
    include_inactive: bool,
) -> Result<Vec<Session>, sqlx::Error> {
    let filter = if include_inactive { "" } else { "WHERE active = 1" };
    let sql = format!(
        "SELECT {SESSION_COLUMNS} FROM sessions {filter} ORDER BY start_date, name, id"
    );
    let rows = sqlx::query_as::<_, SessionRow>(&sql).fetch_all(db).await?;

    let links = sqlx::query_as::<_, (String, String)>(
        "SELECT session_id, partner_id FROM session_attendees",
    )
    .fetch_all(db)
    .await?;

    let mut attendees: HashMap<String, BTreeSet<String>> = HashMap::new();
    for (session_id, partner_id) in links {
        attendees.entry(session_id).or_default().insert(partner_id);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let own = attendees.remove(&row.id).unwrap_or_default();
            row.into_session(own)
        })
        .collect())
}

async fn replace_attendees(conn: &mut SqliteConnection, session: &Session) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM session_attendees WHERE session_id = ?1")
        .bind(&session.id)
        .execute(&mut *conn)
        .await?;

    for partner_id in &session.attendee_ids {
        sqlx::query("INSERT INTO session_attendees (session_id, partner_id) VALUES (?1, ?2)")
            .bind(&session.id)
            .bind(partner_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn insert_session(db: &SqlitePool, req: NewSessionRequest) -> Result<Session, AppError> {
    let now = Utc::now();
    let mut session = req.into_session(Uuid::new_v4().to_string(), now.date_naive());
    session.updated_at = now.to_rfc3339();
    session.validate()?;

    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO sessions
            (id, name, start_date, duration, end_date, seats, active,
            instructor_id, course_id, attendees_count, color, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&session.id)
    .bind(&session.name)
    .bind(session.start_date)
    .bind(session.duration)
    .bind(session.end_date)
    .bind(session.seats)
    .bind(session.active)
    .bind(&session.instructor_id)
    .bind(&session.course_id)
    .bind(session.attendees_count)
    .bind(session.color)
    .bind(&session.updated_at)
    .execute(&mut *tx)
    .await?;

    replace_attendees(&mut tx, &session).await?;
    tx.commit().await?;

    info!("created session {} ({}) for course {}", session.name, session.id, session.course_id);
    Ok(session)
}

/// Applies the request as field edits, recomputes derived values and
/// re-validates before writing. Nothing is written if validation fails.
pub async fn update_session(
    db: &SqlitePool,
    id: &str,
    req: UpdateSessionRequest,
) -> Result<Option<Session>, AppError> {
    let mut tx = db.begin().await?;

    let Some(mut current) = load_session(&mut tx, id).await? else {
        return Ok(None);
    };

    let attendees_changed = req.attendee_ids.is_some();
    current.apply_all(req.into_changes());
    current.updated_at = Utc::now().to_rfc3339();
    current.validate()?;

    sqlx::query(
        r#"
        UPDATE sessions
        SET name = ?1,
            start_date = ?2,
            duration = ?3,
            end_date = ?4,
            seats = ?5,
            active = ?6,
            instructor_id = ?7,
            course_id = ?8,
            attendees_count = ?9,
            color = ?10,
            updated_at = ?11
        WHERE id = ?12
        "#,
    )
    .bind(&current.name)
    .bind(current.start_date)
    .bind(current.duration)
    .bind(current.end_date)
    .bind(current.seats)
    .bind(current.active)
    .bind(&current.instructor_id)
    .bind(&current.course_id)
    .bind(current.attendees_count)
    .bind(current.color)
    .bind(&current.updated_at)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if attendees_changed {
        replace_attendees(&mut tx, &current).await?;
    }
    tx.commit().await?;

    Ok(Some(current))
}

pub async fn delete_session(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = ?1")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}
