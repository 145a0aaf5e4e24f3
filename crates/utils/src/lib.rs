use rand::{distributions::Alphanumeric, Rng};

/// Url safe random string, used for OAuth `state` values
pub fn create_random_secret(secret_len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(secret_len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_creates_random_secret() {
        let sec1 = create_random_secret(16);
        let sec2 = create_random_secret(16);
        assert_eq!(sec1.len(), 16);
        assert_ne!(sec1, sec2);
        assert!(sec1.chars().all(|c| c.is_ascii_alphanumeric()));

        assert_eq!(create_random_secret(47).len(), 47);
    }
}
