pub const MAX_USERNAME_CHARS: usize = 150;
pub const MAX_EMAIL_CHARS: usize = 320;
pub const MAX_PASSWORD_BYTES: usize = 512;

#[derive(Debug, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid(&'static str),
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }
}

pub fn validate_email_address(email: &str) -> Validity {
    if email.chars().count() > MAX_EMAIL_CHARS {
        return Validity::Invalid("Email address is too long.");
    }

    if email.chars().any(char::is_whitespace) {
        return Validity::Invalid("Email address cannot contain a space.");
    }

    if !email.is_ascii() {
        return Validity::Invalid("Email address can only contain ASCII characters.");
    }

    if email.contains("@.") {
        return Validity::Invalid("Domain name in email address cannot begin with a period.");
    }

    let Some((local_part, domain)) = email.split_once('@') else {
        return Validity::Invalid("Email address must contain an at symbol (@).");
    };

    if local_part.is_empty() || domain.len() < 3 {
        return Validity::Invalid("Email username or domain name is too short.");
    }

    if domain.contains('@') || !domain.contains('.') {
        return Validity::Invalid(
            "Email address must have only one at symbol (@) and the domain must contain a period.",
        );
    }

    if domain.ends_with('.') {
        return Validity::Invalid("Email address cannot end with a period.");
    }

    Validity::Valid
}

pub fn validate_username(username: &str) -> Validity {
    if username.trim().is_empty() {
        return Validity::Invalid("Username cannot be blank.");
    }

    if username.chars().count() > MAX_USERNAME_CHARS {
        return Validity::Invalid("Username is too long.");
    }

    Validity::Valid
}

/// Only bounds the length. Password strength policy is left to clients.
pub fn validate_password(password: &str) -> Validity {
    if password.is_empty() {
        return Validity::Invalid("Password cannot be blank.");
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Validity::Invalid("Password is too long.");
    }

    Validity::Valid
}
