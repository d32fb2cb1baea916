use std::sync::Arc;

use otpdesk_application::{
    CodeService, CredentialRepository, CredentialService, MailCodeService, PrincipalRepository,
    PrincipalService,
};
use otpdesk_core::{AppError, AppResult, PrincipalId};
use otpdesk_domain::{CodeExtractor, EmailAddress};
use otpdesk_infrastructure::{
    AesSecretEncryptor, ImapMailboxGateway, InMemoryCredentialRepository,
    InMemoryPrincipalRepository, PostgresCredentialRepository, PostgresPrincipalRepository,
    TotpRsProvider,
};
use tracing::{info, warn};

use super::connect_and_migrate;
use crate::api_config::{ApiConfig, StoreConfig};
use crate::state::AppState;

struct RepositorySet {
    credential_repository: Arc<dyn CredentialRepository>,
    principal_repository: Arc<dyn PrincipalRepository>,
}

pub async fn build_app_state(config: &ApiConfig) -> AppResult<AppState> {
    let repositories = build_repository_set(&config.store).await?;

    let credential_service = CredentialService::new(repositories.credential_repository.clone());
    let principal_service = PrincipalService::new(repositories.principal_repository);
    let code_service = CodeService::new(Arc::new(TotpRsProvider::new()), credential_service.clone());

    let extractor = match &config.label_words {
        Some(words) => CodeExtractor::with_label_words(words)?,
        None => CodeExtractor::new()?,
    };
    let gateway = ImapMailboxGateway::new(config.imap.clone())?;
    info!(
        host = %gateway.settings().host,
        port = gateway.settings().port,
        "mailbox gateway configured"
    );
    let mail_code_service = MailCodeService::new(
        Arc::new(gateway),
        repositories.credential_repository,
        credential_service.clone(),
        Arc::new(extractor),
    );

    if let Some(bootstrap) = &config.bootstrap_admin {
        principal_service
            .bootstrap_admin(
                PrincipalId::new(bootstrap.principal_id.as_str())?,
                EmailAddress::new(bootstrap.email.as_str())?,
            )
            .await?;
    }

    Ok(AppState {
        credential_service,
        code_service,
        mail_code_service,
        principal_service,
        frontend_url: config.frontend_url.clone(),
        gateway_shared_secret: config.gateway_shared_secret.clone(),
    })
}

async fn build_repository_set(store: &StoreConfig) -> AppResult<RepositorySet> {
    match store {
        StoreConfig::Memory => {
            warn!("using in-memory credential store; entries are lost on restart");
            Ok(RepositorySet {
                credential_repository: Arc::new(InMemoryCredentialRepository::new()),
                principal_repository: Arc::new(InMemoryPrincipalRepository::default()),
            })
        }
        StoreConfig::Postgres {
            database_url,
            encryption_key,
        } => {
            let encryptor = AesSecretEncryptor::from_hex(encryption_key.as_str()).map_err(
                |error| AppError::Validation(format!("invalid credential encryption key: {error}")),
            )?;
            let pool = connect_and_migrate(database_url.as_str()).await?;

            Ok(RepositorySet {
                credential_repository: Arc::new(PostgresCredentialRepository::new(
                    pool.clone(),
                    Arc::new(encryptor),
                )),
                principal_repository: Arc::new(PostgresPrincipalRepository::new(pool)),
            })
        }
    }
}
