use rand::Rng;

/// Source of record identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn next_id(&self) -> String {
        self()
    }
}

/// Current epoch milliseconds in base 36 followed by a random base-36 suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampIds;

const SUFFIX_LEN: usize = 11;

impl IdGenerator for TimestampIds {
    fn next_id(&self) -> String {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut rng = rand::thread_rng();
        let mut id = to_base36(millis);
        for _ in 0..SUFFIX_LEN {
            let digit = rng.gen_range(0..36u32);
            id.push(std::char::from_digit(digit, 36).unwrap_or('0'));
        }
        id
    }
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(std::char::from_digit((n % 36) as u32, 36).unwrap_or('0'));
        n /= 36;
    }
    digits.iter().rev().collect()
}
