//! Message composition: image URL merging and mention markup.

/// Merge `url` into `template`.
///
/// Every occurrence of `placeholder` is replaced; when the template has none,
/// a Markdown image block is appended after a blank line.
pub fn compose(template: &str, url: &str, placeholder: &str) -> String {
    if !placeholder.is_empty() && template.contains(placeholder) {
        template.replace(placeholder, url)
    } else {
        format!("{template}\n\n![image]({url})")
    }
}

/// Who a message should notify.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mentions {
    mobiles: Vec<String>,
    all: bool,
}

impl Mentions {
    /// `all` takes precedence: the explicit list is dropped when it is set.
    pub fn new(mobiles: &[String], all: bool) -> Self {
        Self {
            mobiles: if all { Vec::new() } else { mobiles.to_vec() },
            all,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn mobiles(&self) -> &[String] {
        &self.mobiles
    }

    pub fn is_all(&self) -> bool {
        self.all
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.mobiles.is_empty()
    }

    /// Markup placed before the content: `"@all "`, `"@a @b "`, or nothing.
    pub fn prefix(&self) -> String {
        if self.all {
            "@all ".to_string()
        } else if self.mobiles.is_empty() {
            String::new()
        } else {
            let tokens: Vec<String> = self.mobiles.iter().map(|m| format!("@{m}")).collect();
            format!("{} ", tokens.join(" "))
        }
    }

    pub fn apply(&self, content: &str) -> String {
        format!("{}{content}", self.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACEHOLDER: &str = "{IMAGE_URL}";
    const URL: &str = "https://cdn.example.com/a.jpg";

    #[test]
    fn test_compose_replaces_placeholder() {
        let out = compose("## Daily\n![pic]({IMAGE_URL})\nbye", URL, PLACEHOLDER);
        assert_eq!(out, format!("## Daily\n![pic]({URL})\nbye"));
        assert!(!out.contains(PLACEHOLDER));
    }

    #[test]
    fn test_compose_replaces_every_occurrence() {
        let out = compose("{IMAGE_URL} and {IMAGE_URL}", URL, PLACEHOLDER);
        assert_eq!(out, format!("{URL} and {URL}"));
    }

    #[test]
    fn test_compose_appends_without_placeholder() {
        let out = compose("## Daily reminder", URL, PLACEHOLDER);
        assert_eq!(out, format!("## Daily reminder\n\n![image]({URL})"));
    }

    #[test]
    fn test_compose_empty_placeholder_appends() {
        let out = compose("text", URL, "");
        assert_eq!(out, format!("text\n\n![image]({URL})"));
    }

    #[test]
    fn test_mentions_all_suppresses_mobiles() {
        let mentions = Mentions::new(&["138".to_string()], true);
        assert!(mentions.mobiles().is_empty());
        assert_eq!(mentions.apply("hi"), "@all hi");
    }

    #[test]
    fn test_mentions_mobiles() {
        let mentions = Mentions::new(&["138".to_string(), "139".to_string()], false);
        assert_eq!(mentions.apply("hi"), "@138 @139 hi");
        assert!(!mentions.is_empty());
    }

    #[test]
    fn test_mentions_none_leaves_content() {
        assert!(Mentions::none().is_empty());
        assert_eq!(Mentions::new(&[], false).apply("hi"), "hi");
    }
}
