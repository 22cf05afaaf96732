use std::path::Path;

use axum::extract::{Multipart, State};

use crate::{error::ApiError, state::AppState};

/// `POST /uploader`：保存上传的头像文件为 `{目录}/{userid}{扩展名}`
pub async fn upload_avatar(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<&'static str, ApiError> {
    let mut userid: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(err.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("userid") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| ApiError::bad_request(err.body_text()))?;
                userid = Some(text);
            }
            Some("avatarFile") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::bad_request(err.body_text()))?;
                file = Some((filename, data.to_vec()));
            }
            _ => {}
        }
    }

    let userid = userid.ok_or_else(|| ApiError::bad_request("Missing userid field"))?;
    validate_userid(&userid)?;
    let (filename, data) = file.ok_or_else(|| ApiError::bad_request("Missing avatarFile field"))?;

    let directory = Path::new(&state.config.avatar.directory);
    let target = directory.join(format!("{}{}", userid, extension_of(&filename)));

    tokio::fs::create_dir_all(directory).await.map_err(|err| {
        tracing::error!(error = %err, "failed to create avatar directory");
        ApiError::internal_server_error("Failed to store avatar")
    })?;
    tokio::fs::write(&target, &data).await.map_err(|err| {
        tracing::error!(error = %err, path = %target.display(), "failed to write avatar");
        ApiError::internal_server_error("Failed to store avatar")
    })?;

    tracing::info!(userid = %userid, path = %target.display(), bytes = data.len(), "avatar uploaded");
    Ok("Successful")
}

/// userid 直接拼进文件名，不能跳出头像目录
fn validate_userid(userid: &str) -> Result<(), ApiError> {
    if userid.is_empty()
        || userid.contains(['/', '\\'])
        || userid.contains("..")
    {
        return Err(ApiError::bad_request("Invalid userid"));
    }
    Ok(())
}

/// 带点的扩展名，如 `.png`；没有扩展名时为空
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_keeps_leading_dot() {
        assert_eq!(extension_of("me.png"), ".png");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of(""), "");
    }

    #[test]
    fn userid_must_not_escape_directory() {
        assert!(validate_userid("abc123").is_ok());
        assert!(validate_userid("").is_err());
        assert!(validate_userid("../etc").is_err());
        assert!(validate_userid("a/b").is_err());
        assert!(validate_userid("a\\b").is_err());
    }
}
