pub const DERIVE_SYSTEM: &str = include_str!("../data/prompts/derive_system.txt");
pub const DERIVE_USER: &str = include_str!("../data/prompts/derive_user.txt");
pub const REFINE_SYSTEM: &str = include_str!("../data/prompts/refine_system.txt");
pub const REFINE_USER: &str = include_str!("../data/prompts/refine_user.txt");

/// Stand-in for empty additional requirements.
pub const NO_REQUIREMENTS: &str = "none";

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_var() {
        assert_eq!(
            render("Hello {{name}}!", &[("name", "world")]),
            "Hello world!"
        );
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        assert_eq!(render("{{a}} and {{b}}", &[("a", "cats")]), "cats and {{b}}");
    }

    #[test]
    fn test_prompts_are_non_empty() {
        assert!(!DERIVE_SYSTEM.is_empty());
        assert!(!DERIVE_USER.is_empty());
        assert!(!REFINE_SYSTEM.is_empty());
        assert!(!REFINE_USER.is_empty());
    }

    #[test]
    fn test_templates_have_placeholders() {
        assert!(DERIVE_USER.contains("{{requirements}}"));
        assert!(DERIVE_USER.contains("{{input_count}}"));
        assert!(REFINE_USER.contains("{{prompt}}"));
    }
}
