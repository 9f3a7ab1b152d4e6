use rand::Rng;

/// Generate a random password with the given length, suitable for new SQL
/// users. The charset avoids characters that need shell quoting.
pub fn gen_password(length: u8) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                            abcdefghijklmnopqrstuvwxyz\
                            0123456789";

    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_password_length() {
        assert_eq!(gen_password(16).len(), 16);
        assert_eq!(gen_password(0).len(), 0);
    }

    #[test]
    fn test_gen_password_charset() {
        let password = gen_password(64);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
