//! Login, sign-up and password reset for site administrators.

pub mod guard;

pub use guard::{guard, RouteDecision, ADMIN_PATH, LOGIN_PATH};

use crate::backend::AuthProvider;
use crate::error::{Result, ServiceError};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

lazy_static! {
    static ref EMAIL_PATTERN: Regex = Regex::new(r"\S+@\S+\.\S+").expect("valid email pattern");
}

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    SignUp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
}

/// Banner shown above the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMessage {
    pub kind: MessageKind,
    pub text: String,
}

impl AuthMessage {
    fn success(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Success,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            text: text.into(),
        }
    }
}

/// Check the form before anything is sent; the error is user-facing.
pub fn validate(form: &AuthForm, mode: AuthMode) -> Result<()> {
    if form.email.is_empty() || form.password.is_empty() {
        return Err(ServiceError::validation("Por favor, preencha todos os campos obrigatórios."));
    }
    if !EMAIL_PATTERN.is_match(&form.email) {
        return Err(ServiceError::validation("Por favor, insira um email válido."));
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::validation("A senha deve ter pelo menos 6 caracteres."));
    }
    if mode == AuthMode::SignUp {
        if form.full_name.is_empty() {
            return Err(ServiceError::validation("Por favor, insira seu nome completo."));
        }
        if form.password != form.confirm_password {
            return Err(ServiceError::validation("As senhas não coincidem."));
        }
    }
    Ok(())
}

/// State of the `/acesso` page
pub struct AuthPage {
    provider: Arc<dyn AuthProvider>,
    site_url: String,
    mode: AuthMode,
    form: AuthForm,
    message: Option<AuthMessage>,
}

impl AuthPage {
    pub fn new(provider: Arc<dyn AuthProvider>, site_url: impl Into<String>) -> Self {
        Self {
            provider,
            site_url: site_url.into(),
            mode: AuthMode::Login,
            form: AuthForm::default(),
            message: None,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn form(&self) -> &AuthForm {
        &self.form
    }

    pub fn message(&self) -> Option<&AuthMessage> {
        self.message.as_ref()
    }

    /// Switching between login and sign-up starts from a blank form
    pub fn switch_mode(&mut self, mode: AuthMode) {
        if self.mode != mode {
            self.mode = mode;
            self.form = AuthForm::default();
            self.message = None;
        }
    }

    /// Edit the form; any banner is dismissed as soon as the user types
    pub fn edit(&mut self) -> &mut AuthForm {
        self.message = None;
        &mut self.form
    }

    /// Redirect target when a session already exists
    pub async fn existing_session_redirect(&self) -> Option<&'static str> {
        match self.provider.current_user().await {
            Ok(Some(_)) => Some(ADMIN_PATH),
            Ok(None) => None,
            Err(e) => {
                error!("Erro ao verificar sessão: {}", e);
                None
            }
        }
    }

    /// Submit in the current mode. Returns where to navigate on success.
    pub async fn submit(&mut self) -> Option<&'static str> {
        if let Err(reason) = validate(&self.form, self.mode) {
            self.message = Some(AuthMessage::error(reason.to_string()));
            return None;
        }

        match self.mode {
            AuthMode::Login => self.login().await,
            AuthMode::SignUp => {
                self.sign_up().await;
                None
            }
        }
    }

    async fn login(&mut self) -> Option<&'static str> {
        match self
            .provider
            .sign_in_with_password(&self.form.email, &self.form.password)
            .await
        {
            Ok(session) => {
                info!("Login succeeded for {}", session.user.email.as_deref().unwrap_or("?"));
                self.message = Some(AuthMessage::success(
                    "Login realizado com sucesso! Redirecionando...",
                ));
                Some(ADMIN_PATH)
            }
            Err(e) => {
                error!("Erro no login: {}", e);
                let text = if e.to_string().contains("Invalid login credentials") {
                    "Email ou senha incorretos.".to_string()
                } else {
                    non_empty_or(e.to_string(), "Erro ao fazer login.")
                };
                self.message = Some(AuthMessage::error(text));
                None
            }
        }
    }

    async fn sign_up(&mut self) {
        let metadata = json!({ "full_name": self.form.full_name });
        match self
            .provider
            .sign_up(&self.form.email, &self.form.password, metadata)
            .await
        {
            Ok(()) => {
                info!("Sign-up requested for {}", self.form.email);
                self.message = Some(AuthMessage::success(
                    "Cadastro realizado! Verifique seu email para confirmar a conta.",
                ));
            }
            Err(e) => {
                error!("Erro no cadastro: {}", e);
                let text = if e.to_string().contains("User already registered") {
                    "Este email já está cadastrado.".to_string()
                } else {
                    non_empty_or(e.to_string(), "Erro ao criar conta.")
                };
                self.message = Some(AuthMessage::error(text));
            }
        }
    }

    /// Send a password reset link to the email in the form
    pub async fn forgot_password(&mut self) {
        if self.form.email.is_empty() {
            self.message = Some(AuthMessage::error("Por favor, insira seu email primeiro."));
            return;
        }

        let redirect_to = format!("{}/reset-password", self.site_url.trim_end_matches('/'));
        self.message = Some(
            match self
                .provider
                .reset_password_for_email(&self.form.email, &redirect_to)
                .await
            {
                Ok(()) => AuthMessage::success("Link de recuperação enviado para seu email!"),
                Err(e) => {
                    error!("Erro ao recuperar senha: {}", e);
                    AuthMessage::error("Erro ao enviar email de recuperação.")
                }
            },
        );
    }

    pub async fn sign_out(&mut self) -> Result<()> {
        self.provider.sign_out().await?;
        self.message = None;
        Ok(())
    }
}

fn non_empty_or(text: String, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn form(email: &str, password: &str) -> AuthForm {
        AuthForm {
            email: email.to_string(),
            password: password.to_string(),
            ..AuthForm::default()
        }
    }

    fn rejection(form: &AuthForm, mode: AuthMode) -> String {
        let err = validate(form, mode).unwrap_err();
        assert!(err.is_validation());
        err.to_string()
    }

    fn backend_with_ana() -> Arc<MemoryBackend> {
        Arc::new(MemoryBackend::new().with_account("ana@terraventos.com", "segredo1", "Ana"))
    }

    #[test]
    fn validation_order_and_messages() {
        assert_eq!(
            rejection(&form("", "segredo1"), AuthMode::Login),
            "Por favor, preencha todos os campos obrigatórios."
        );
        assert_eq!(
            rejection(&form("ana@terraventos", "segredo1"), AuthMode::Login),
            "Por favor, insira um email válido."
        );
        assert_eq!(
            rejection(&form("ana@terraventos.com", "12345"), AuthMode::Login),
            "A senha deve ter pelo menos 6 caracteres."
        );
        assert!(validate(&form("ana@terraventos.com", "123456"), AuthMode::Login).is_ok());

        let mut signup = form("ana@terraventos.com", "123456");
        assert_eq!(
            rejection(&signup, AuthMode::SignUp),
            "Por favor, insira seu nome completo."
        );
        signup.full_name = "Ana Souza".to_string();
        signup.confirm_password = "654321".to_string();
        assert_eq!(rejection(&signup, AuthMode::SignUp), "As senhas não coincidem.");
    }

    #[tokio::test]
    async fn login_success_redirects_to_admin() {
        let backend = backend_with_ana();
        let mut page = AuthPage::new(backend.clone(), "http://localhost:3000");
        *page.edit() = form("ana@terraventos.com", "segredo1");

        assert_eq!(page.submit().await, Some(ADMIN_PATH));
        assert_eq!(page.message().unwrap().kind, MessageKind::Success);
        assert_eq!(page.existing_session_redirect().await, Some(ADMIN_PATH));
    }

    #[tokio::test]
    async fn wrong_password_is_localized() {
        let backend = backend_with_ana();
        let mut page = AuthPage::new(backend, "http://localhost:3000");
        *page.edit() = form("ana@terraventos.com", "errada99");

        assert_eq!(page.submit().await, None);
        let message = page.message().unwrap();
        assert_eq!(message.kind, MessageKind::Error);
        assert_eq!(message.text, "Email ou senha incorretos.");

        page.edit().password.push('!');
        assert!(page.message().is_none());
    }

    #[tokio::test]
    async fn duplicate_sign_up_is_localized() {
        let backend = backend_with_ana();
        let mut page = AuthPage::new(backend, "http://localhost:3000");
        page.switch_mode(AuthMode::SignUp);
        *page.edit() = AuthForm {
            email: "ana@terraventos.com".to_string(),
            password: "outra123".to_string(),
            confirm_password: "outra123".to_string(),
            full_name: "Ana".to_string(),
        };

        assert_eq!(page.submit().await, None);
        assert_eq!(page.message().unwrap().text, "Este email já está cadastrado.");

        page.switch_mode(AuthMode::Login);
        assert_eq!(page.form(), &AuthForm::default());
        assert!(page.message().is_none());
    }

    #[tokio::test]
    async fn forgot_password_needs_email_and_sends_redirect() {
        let backend = Arc::new(MemoryBackend::new());
        let mut page = AuthPage::new(backend.clone(), "https://terraventos.com.br/");

        page.forgot_password().await;
        assert_eq!(page.message().unwrap().text, "Por favor, insira seu email primeiro.");

        page.edit().email = "ana@terraventos.com".to_string();
        page.forgot_password().await;
        assert_eq!(page.message().unwrap().text, "Link de recuperação enviado para seu email!");
        assert_eq!(
            backend.password_resets(),
            vec![(
                "ana@terraventos.com".to_string(),
                "https://terraventos.com.br/reset-password".to_string()
            )]
        );
    }
}
