use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use rollcall_core::api::UserSummary;
use rollcall_core::{ApiError, Role, SectionId, UserId};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::AppContext;
use crate::cli::LectureAction;

pub fn whoami(ctx: &AppContext) -> Result<ExitCode> {
    let identity = ctx.identity()?;

    println!("user:    {}", identity.username);
    println!("id:      {}", identity.user_id);
    println!("role:    {}", identity.role);
    match identity.expires_at {
        Some(at) => println!("expires: {}", at.to_rfc3339()),
        None => println!("expires: never"),
    }
    println!("server:  {}", ctx.client.base_url());
    println!("queue:   {}", ctx.config.queue_dir.display());
    let metadata = &ctx.config.metadata;
    match &metadata.config_path {
        Some(path) => println!("config:  {}", path.display()),
        None => println!("config:  (environment and defaults)"),
    }
    if metadata.env_file_loaded {
        println!("env:     loaded from dotenv file");
    }
    Ok(ExitCode::SUCCESS)
}

/// Print the rotating token a student shows to the teacher.
pub async fn token(ctx: &AppContext, user: Option<i64>) -> Result<ExitCode> {
    let user_id = match user {
        Some(id) => UserId(id),
        None => ctx.identity()?.user_id,
    };

    let issued = ctx
        .client
        .student_qr_token(user_id)
        .await
        .context("failed to fetch the student token")?;

    println!("{}", issued.token);
    if let Some(secs) = issued.expires_in {
        println!(
            "expires in {}",
            humantime::format_duration(Duration::from_secs(secs))
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn lecture(ctx: &AppContext, action: LectureAction) -> Result<ExitCode> {
    let teacher = ctx.identity()?.user_id;

    let response = match action {
        LectureAction::Enable => ctx.client.enable_lecture_mode(teacher).await,
        LectureAction::Disable => ctx.client.disable_lecture_mode(teacher).await,
    }
    .context("failed to change lecture mode")?;

    if let Some(message) = response.message {
        println!("{message}");
    }
    if let Some(secret) = response.master_qr_secret {
        println!("lecture secret: {secret}");
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn sections(ctx: &AppContext) -> Result<ExitCode> {
    let sections = ctx
        .client
        .list_sections()
        .await
        .context("failed to list sections")?;

    for section in sections {
        println!("{}\t{}", section.id, section.name);
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn students(ctx: &AppContext) -> Result<ExitCode> {
    let users = ctx
        .client
        .list_users()
        .await
        .context("failed to list users")?;

    for line in student_lines(&users) {
        println!("{line}");
    }
    Ok(ExitCode::SUCCESS)
}

fn student_lines(users: &[UserSummary]) -> Vec<String> {
    users
        .iter()
        .filter(|user| user.role() == Some(Role::Student))
        .map(|user| format!("{}\t{}", user.id, user.display_name()))
        .collect()
}

pub async fn attendance(ctx: &AppContext, section: Option<i64>) -> Result<ExitCode> {
    let section = section.map(SectionId).or(ctx.config.section_id);
    let count = ctx
        .client
        .attendance_count(section)
        .await
        .context("failed to fetch the attendance count")?;

    match section {
        Some(id) => println!("{count} attendance records in section {id}"),
        None => println!("{count} attendance records"),
    }
    Ok(ExitCode::SUCCESS)
}

/// Print a fresh session token on stdout so it can be captured into
/// `ROLLCALL_TOKEN`.
pub async fn login(ctx: &AppContext, username: &str, password: Option<String>) -> Result<ExitCode> {
    let password = match password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            BufReader::new(tokio::io::stdin())
                .read_line(&mut line)
                .await
                .context("failed to read the password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        bail!("no password given; set ROLLCALL_PASSWORD or pipe it on stdin");
    }

    let issued = match ctx.client.login(username, &password).await {
        Ok(issued) => issued,
        Err(ApiError::Status { status: 401, detail }) => bail!("sign-in refused: {detail}"),
        Err(err) => return Err(anyhow::Error::new(err).context("sign-in failed")),
    };
    println!("{}", issued.access_token);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: &str, full_name: Option<&str>) -> UserSummary {
        UserSummary {
            id: UserId(id),
            username: format!("user{id}"),
            full_name: full_name.map(str::to_string),
            role: role.to_string(),
        }
    }

    #[test]
    fn only_students_are_listed() {
        let users = [
            user(1, "teacher", Some("Ada Prof")),
            user(4, "student", Some("Sam Student")),
            user(5, "student", None),
            user(6, "admin", None),
        ];

        assert_eq!(student_lines(&users), ["4\tSam Student", "5\tuser5"]);
    }
}
