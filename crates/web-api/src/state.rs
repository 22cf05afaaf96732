use std::sync::Arc;

use application::HubHandle;
use config::{AppConfig, AvatarConfig, AvatarSource};
use domain::{AuthAvatar, AvatarChain, AvatarResolver, FileSystemAvatar, GravatarAvatar, Identity};

#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub avatars: Arc<AvatarChain>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(hub: HubHandle, config: AppConfig) -> Self {
        let avatars = Arc::new(build_avatar_chain(&config.avatar));
        Self {
            hub,
            avatars,
            config: Arc::new(config),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.auth.cookie_name
    }

    /// 解析头像；文件系统策略会读目录，放到阻塞线程池执行
    pub async fn resolve_avatar(&self, identity: &Identity) -> String {
        let avatars = self.avatars.clone();
        let identity = identity.clone();
        tokio::task::spawn_blocking(move || avatars.resolve(&identity).unwrap_or_default())
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "avatar resolution aborted");
                String::new()
            })
    }
}

/// 按配置顺序组装头像解析链
pub fn build_avatar_chain(config: &AvatarConfig) -> AvatarChain {
    config
        .chain
        .iter()
        .fold(AvatarChain::new(), |chain, source| match source {
            AvatarSource::Auth => chain.with(AuthAvatar),
            AvatarSource::Gravatar => chain.with(GravatarAvatar::new(&config.gravatar_base)),
            AvatarSource::FileSystem => {
                chain.with(FileSystemAvatar::new(&config.directory, &config.url_prefix))
            }
        })
}
