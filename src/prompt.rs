use colored::Colorize;

pub struct Prompt {
    user: String,
    prefix: String,
}

impl Prompt {
    pub fn new(prefix: &str) -> Self {
        Self {
            user: whoami::username(),
            prefix: prefix.to_string(),
        }
    }

    pub fn get_string(&self) -> String {
        format!("{} {} ", self.user.green(), self.prefix.bold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::test_lock;

    #[test]
    fn test_prompt_contains_prefix() {
        // the user lookup may open files; keep it out of descriptor counts
        let _guard = test_lock();
        colored::control::set_override(false);
        let prompt = Prompt::new("CustomShell>");
        let s = prompt.get_string();
        assert!(s.ends_with("CustomShell> "));
        assert!(s.starts_with(&whoami::username()));
    }
}
