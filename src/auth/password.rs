use argon2::{
    Argon2,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
}

/// A malformed stored hash counts as a mismatch. Bcrypt hashes (`$2y$`, `$2b$`
/// and friends) carried over from the PHP user table still verify.
pub fn verify_password(password: &str, hashed: &str) -> bool {
    if is_bcrypt(hashed) {
        return bcrypt::verify(password, hashed).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Stored bcrypt hash is malformed");
            false
        });
    }

    let Ok(parsed) = PasswordHash::new(hashed) else {
        tracing::warn!("Stored password hash is not in PHC format");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// True when the stored hash should be replaced with an argon2 one after a
/// successful login.
pub fn needs_rehash(hashed: &str) -> bool {
    is_bcrypt(hashed)
}

fn is_bcrypt(hashed: &str) -> bool {
    ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|prefix| hashed.starts_with(prefix))
}
