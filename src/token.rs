use rand::Rng;
use rand::distr::Alphanumeric;

/// 退订令牌长度
pub const UNSUBSCRIBE_TOKEN_LEN: usize = 48;

/// 会话令牌长度
pub const SESSION_TOKEN_LEN: usize = 48;

/// 生成指定长度的随机字母数字令牌
pub fn generate(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate() {
        let token = generate(UNSUBSCRIBE_TOKEN_LEN);
        assert_eq!(token.len(), UNSUBSCRIBE_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));

        // 两次生成应不同
        assert_ne!(token, generate(UNSUBSCRIBE_TOKEN_LEN));
    }
}
