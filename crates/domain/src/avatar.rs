//! 头像解析链
//!
//! 每种策略只负责一种来源，`AvatarChain` 按调用方给定的顺序依次尝试，
//! 返回第一个成功的结果。未找到头像不是错误，调用方用空字符串代替。

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::identity::Identity;

/// 头像解析策略
pub trait AvatarResolver: Send + Sync {
    /// 返回头像地址；找不到时返回 `None`
    fn resolve(&self, identity: &Identity) -> Option<String>;
}

/// 使用认证服务提供的头像地址
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthAvatar;

impl AvatarResolver for AuthAvatar {
    fn resolve(&self, identity: &Identity) -> Option<String> {
        identity
            .avatar_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(str::to_owned)
    }
}

/// 由稳定 ID 拼接 Gravatar 地址
///
/// 稳定 ID 被视为已计算好的哈希，不做任何校验。
#[derive(Debug, Clone)]
pub struct GravatarAvatar {
    base_url: String,
}

impl GravatarAvatar {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for GravatarAvatar {
    fn default() -> Self {
        Self::new("//www.gravatar.com")
    }
}

impl AvatarResolver for GravatarAvatar {
    fn resolve(&self, identity: &Identity) -> Option<String> {
        if identity.stable_id.is_empty() {
            return None;
        }
        Some(format!(
            "{}/avatar/{}",
            self.base_url.trim_end_matches('/'),
            identity.stable_id
        ))
    }
}

/// 在本地目录中查找以稳定 ID 开头的文件
#[derive(Debug, Clone)]
pub struct FileSystemAvatar {
    directory: PathBuf,
    url_prefix: String,
}

impl FileSystemAvatar {
    pub fn new(directory: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            url_prefix: url_prefix.into(),
        }
    }
}

impl AvatarResolver for FileSystemAvatar {
    fn resolve(&self, identity: &Identity) -> Option<String> {
        if identity.stable_id.is_empty() {
            return None;
        }

        // 目录读取失败一律视为未找到
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!(
                    directory = %self.directory.display(),
                    error = %err,
                    "avatar directory unavailable"
                );
                return None;
            }
        };

        // read_dir 的顺序由文件系统决定，排序后结果才稳定
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(&identity.stable_id))
            .collect();
        names.sort();

        names.into_iter().next().map(|name| {
            let prefix = self.url_prefix.trim_end_matches('/');
            format!("{prefix}/{name}")
        })
    }
}

/// 按顺序尝试的策略链，本身也是一个 `AvatarResolver`
#[derive(Clone, Default)]
pub struct AvatarChain {
    resolvers: Vec<Arc<dyn AvatarResolver>>,
}

impl AvatarChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: impl AvatarResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl AvatarResolver for AvatarChain {
    fn resolve(&self, identity: &Identity) -> Option<String> {
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.resolve(identity))
    }
}

impl std::fmt::Debug for AvatarChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarChain")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 记录调用次数的策略，用来确认短路
    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl AvatarResolver for Counting {
        fn resolve(&self, _identity: &Identity) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some("counted".into())
        }
    }

    #[test]
    fn auth_avatar_requires_non_empty_url() {
        let identity = Identity::new("Ann", "abc");
        assert_eq!(AuthAvatar.resolve(&identity), None);

        let identity = Identity::new("Ann", "abc").with_avatar_url("");
        assert_eq!(AuthAvatar.resolve(&identity), None);

        let identity = Identity::new("Ann", "abc").with_avatar_url("http://url-to-gravatar/");
        assert_eq!(
            AuthAvatar.resolve(&identity).as_deref(),
            Some("http://url-to-gravatar/")
        );
    }

    #[test]
    fn gravatar_concatenates_stable_id() {
        let identity = Identity::new("Ann", "0bc83cb571cd1c50ba6f3e8a78ef1346");
        assert_eq!(
            GravatarAvatar::default().resolve(&identity).as_deref(),
            Some("//www.gravatar.com/avatar/0bc83cb571cd1c50ba6f3e8a78ef1346")
        );

        // 不校验格式，任何非空 ID 都成功
        let identity = Identity::new("Ann", "not a hash?");
        assert_eq!(
            GravatarAvatar::new("https://g.example/").resolve(&identity).as_deref(),
            Some("https://g.example/avatar/not a hash?")
        );
    }

    #[test]
    fn gravatar_fails_only_on_missing_id() {
        assert_eq!(GravatarAvatar::default().resolve(&Identity::new("Ann", "")), None);
    }

    #[test]
    fn chain_falls_back_when_auth_url_is_empty() {
        let chain = AvatarChain::new()
            .with(AuthAvatar)
            .with(GravatarAvatar::default());
        let identity = Identity::new("Ann", "abc").with_avatar_url("");

        assert_eq!(
            chain.resolve(&identity).as_deref(),
            Some("//www.gravatar.com/avatar/abc")
        );
    }

    #[test]
    fn chain_short_circuits_on_first_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = AvatarChain::new().with(AuthAvatar).with(Counting {
            calls: calls.clone(),
        });
        let identity = Identity::new("Ann", "abc").with_avatar_url("http://x");

        assert_eq!(chain.resolve(&identity).as_deref(), Some("http://x"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_chain_finds_nothing() {
        let chain = AvatarChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.resolve(&Identity::new("Ann", "abc")), None);
    }

    #[test]
    fn file_system_matches_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("abc.png"), b"png").unwrap();
        fs::write(dir.path().join("zzz.jpg"), b"jpg").unwrap();
        fs::create_dir(dir.path().join("abcdir")).unwrap();

        let resolver = FileSystemAvatar::new(dir.path(), "/avatars/");
        assert_eq!(
            resolver.resolve(&Identity::new("Ann", "abc")).as_deref(),
            Some("/avatars/abc.png")
        );
        assert_eq!(resolver.resolve(&Identity::new("Bob", "xyz")), None);
    }

    #[test]
    fn file_system_ignores_directories_with_matching_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("abc")).unwrap();

        let resolver = FileSystemAvatar::new(dir.path(), "/avatars");
        assert_eq!(resolver.resolve(&Identity::new("Ann", "abc")), None);
    }

    #[test]
    fn file_system_treats_missing_directory_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FileSystemAvatar::new(dir.path().join("missing"), "/avatars/");
        assert_eq!(resolver.resolve(&Identity::new("Ann", "abc")), None);
    }

    #[test]
    fn file_system_falls_back_to_gravatar_in_chain() {
        let dir = tempfile::tempdir().unwrap();
        let chain = AvatarChain::new()
            .with(FileSystemAvatar::new(dir.path(), "/avatars/"))
            .with(AuthAvatar)
            .with(GravatarAvatar::default());

        let identity = Identity::new("Ann", "abc");
        assert_eq!(
            chain.resolve(&identity).as_deref(),
            Some("//www.gravatar.com/avatar/abc")
        );

        fs::write(dir.path().join("abc.gif"), b"gif").unwrap();
        assert_eq!(chain.resolve(&identity).as_deref(), Some("/avatars/abc.gif"));
    }
}
