use crate::helpers::signature::{self, SIGNATURE_HEADER};
use chrono::Utc;

/// Signs a payload the way the billing provider does, for local webhook
/// testing.
pub struct SignCommand {
    secret: String,
    file: String,
}

impl SignCommand {
    pub fn new(secret: String, file: String) -> Self {
        Self { secret, file }
    }
}

impl crate::console::commands::CallableTrait for SignCommand {
    fn call(&self) -> Result<(), Box<dyn std::error::Error>> {
        let body = std::fs::read(&self.file)?;
        let header = signature::sign(self.secret.as_bytes(), Utc::now().timestamp(), &body)?;
        println!("{}: {}", SIGNATURE_HEADER, header);
        Ok(())
    }
}
