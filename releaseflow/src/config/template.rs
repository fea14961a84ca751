//! `{placeholder}` substitution for argument and path templates.

/// Replaces every `{name}` in `template` with its value from `vars`.
/// Unknown placeholders are left untouched.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();
    for (name, value) in vars {
        rendered = rendered.replace(&format!("{{{name}}}"), value);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template() {
        let vars = [("tool", "gt-installer"), ("triple", "x86_64-pc-windows-msvc"), ("exe", ".exe")];
        assert_eq!(
            render_template("target/{triple}/release/{tool}{exe}", &vars),
            "target/x86_64-pc-windows-msvc/release/gt-installer.exe"
        );
    }

    #[test]
    fn test_unknown_placeholder_untouched() {
        assert_eq!(render_template("{nope}-{tool}", &[("tool", "t")]), "{nope}-t");
    }
}
