//! Console prompt helpers.

use std::io::Write;

/// Prompt shown by the input thread for `user_id`.
pub fn prompt_for(user_id: &str) -> String {
    format!("{}> ", user_id)
}

/// Redisplay the prompt after printing something asynchronously
pub fn redisplay_prompt(user_id: &str) {
    print!("{}", prompt_for(user_id));
    std::io::stdout().flush().ok();
}
