use chrono::Utc;

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_after_2024() {
        // 2024-01-01T00:00:00Z
        assert!(now_millis() > 1_704_067_200_000);
    }
}
