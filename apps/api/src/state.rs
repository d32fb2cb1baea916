use otpdesk_application::{CodeService, CredentialService, MailCodeService, PrincipalService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub credential_service: CredentialService,
    pub code_service: CodeService,
    pub mail_code_service: MailCodeService,
    pub principal_service: PrincipalService,
    pub frontend_url: String,
    pub gateway_shared_secret: String,
}
