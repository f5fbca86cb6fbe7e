// src/translate.rs

//! Name translation applied while importing
//!
//! Destination paths go through a list of Perl-style substitution rules
//! (`s#search#replace#` with an optional `g` flag). By default the first
//! rule that matches wins; with `continue_matching` every matching rule is
//! applied to the output of the previous one.
//!
//! Principal names (users, groups, and the principals referenced by
//! access-control entries) go through a plain lookup table so that archives
//! exported with legacy default account names land on the target's own.

use crate::config::{ImportConfig, PrincipalTranslationConfig};
use crate::error::{Error, Result};
use regex::Regex;
use tracing::debug;

/// One compiled `s#search#replace#flags` rule
#[derive(Debug, Clone)]
struct Rule {
    source: String,
    pattern: Regex,
    replacement: String,
    global: bool,
}

impl Rule {
    fn parse(rule: &str) -> Result<Self> {
        let invalid = || Error::InvalidRule(rule.to_string());

        let body = rule.strip_prefix('s').ok_or_else(invalid)?;
        let mut chars = body.chars();
        let delim = chars.next().ok_or_else(invalid)?;
        if delim.is_alphanumeric() || delim.is_whitespace() {
            return Err(invalid());
        }

        let parts: Vec<&str> = chars.as_str().split(delim).collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let flags = parts[2];
        if flags.chars().any(|c| c != 'g' && c != 'i') {
            return Err(invalid());
        }

        let search = if flags.contains('i') {
            format!("(?i){}", parts[0])
        } else {
            parts[0].to_string()
        };

        Ok(Self {
            source: rule.to_string(),
            pattern: Regex::new(&search)?,
            replacement: normalize_replacement(parts[1]),
            global: flags.contains('g'),
        })
    }

    fn apply(&self, input: &str) -> Option<String> {
        if !self.pattern.is_match(input) {
            return None;
        }
        let out = if self.global {
            self.pattern.replace_all(input, self.replacement.as_str())
        } else {
            self.pattern.replace(input, self.replacement.as_str())
        };
        Some(out.into_owned())
    }
}

/// Rewrite `$1` as `${1}` so a following letter is not read as part of the
/// group name
fn normalize_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len() + 4);
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$'
            && let Some(d) = chars.peek()
            && d.is_ascii_digit()
        {
            let mut group = String::new();
            while let Some(d) = chars.peek()
                && d.is_ascii_digit()
            {
                group.push(*d);
                chars.next();
            }
            out.push_str("${");
            out.push_str(&group);
            out.push('}');
        } else {
            out.push(c);
        }
    }
    out
}

/// Destination-path translator
#[derive(Debug, Clone, Default)]
pub struct ResourceTranslator {
    rules: Vec<Rule>,
    continue_matching: bool,
}

impl ResourceTranslator {
    /// Compile a rule list; a malformed rule is a configuration error
    pub fn new(rules: &[String], continue_matching: bool) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|r| Rule::parse(r))
            .collect::<Result<Vec<_>>>()?;
        debug!("{} translation rules initialized", rules.len());
        Ok(Self {
            rules,
            continue_matching,
        })
    }

    pub fn from_config(config: &ImportConfig) -> Result<Self> {
        Self::new(
            &config.translation.rules,
            config.translation.continue_matching,
        )
    }

    pub fn translate(&self, name: &str) -> String {
        let mut current = name.to_string();
        for rule in &self.rules {
            if let Some(translated) = rule.apply(&current) {
                debug!("Rule {} translated {} to {}", rule.source, current, translated);
                if !self.continue_matching {
                    return translated;
                }
                current = translated;
            }
        }
        current
    }
}

/// Legacy principal names mapped onto target principal names
#[derive(Debug, Clone, Default)]
pub struct PrincipalTranslator {
    config: PrincipalTranslationConfig,
}

impl PrincipalTranslator {
    pub fn new(config: PrincipalTranslationConfig) -> Self {
        Self { config }
    }

    pub fn translate_user(&self, name: &str) -> String {
        self.config
            .users
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn translate_group(&self, name: &str) -> String {
        self.config
            .groups
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_rules_is_identity() {
        let t = ResourceTranslator::default();
        assert_eq!(t.translate("/a/b.html"), "/a/b.html");
    }

    #[test]
    fn test_bodies_rule() {
        let t = ResourceTranslator::new(
            &rules(&["s#/default/vfs/content/bodys/(.*)#/default/vfs/system/bodies/$1#"]),
            false,
        )
        .unwrap();
        assert_eq!(
            t.translate("/default/vfs/content/bodys/news/index.html"),
            "/default/vfs/system/bodies/news/index.html"
        );
        assert_eq!(t.translate("/default/vfs/other"), "/default/vfs/other");
    }

    #[test]
    fn test_first_match_wins() {
        let t = ResourceTranslator::new(&rules(&["s#^/a/#/b/#", "s#^/b/#/c/#"]), false).unwrap();
        assert_eq!(t.translate("/a/x"), "/b/x");
    }

    #[test]
    fn test_continue_matching() {
        let t = ResourceTranslator::new(&rules(&["s#^/a/#/b/#", "s#^/b/#/c/#"]), true).unwrap();
        assert_eq!(t.translate("/a/x"), "/c/x");
    }

    #[test]
    fn test_global_flag() {
        let t = ResourceTranslator::new(&rules(&["s#_#-#g"]), false).unwrap();
        assert_eq!(t.translate("/a_b_c"), "/a-b-c");
        let t = ResourceTranslator::new(&rules(&["s#_#-#"]), false).unwrap();
        assert_eq!(t.translate("/a_b_c"), "/a-b_c");
    }

    #[test]
    fn test_group_followed_by_text() {
        let t = ResourceTranslator::new(&rules(&["s#^/(\\w+)/#/$1x/#"]), false).unwrap();
        assert_eq!(t.translate("/site/page"), "/sitex/page");
    }

    #[test]
    fn test_malformed_rules() {
        assert!(ResourceTranslator::new(&rules(&["#a#b#"]), false).is_err());
        assert!(ResourceTranslator::new(&rules(&["s#a#b"]), false).is_err());
        assert!(ResourceTranslator::new(&rules(&["s#(#b#"]), false).is_err());
        assert!(ResourceTranslator::new(&rules(&["s#a#b#x"]), false).is_err());
    }

    #[test]
    fn test_principal_translation() {
        let mut config = PrincipalTranslationConfig::default();
        config.users.insert("Guest".to_string(), "guest".to_string());
        config
            .groups
            .insert("Projectmanager".to_string(), "Projectmanagers".to_string());
        let t = PrincipalTranslator::new(config);

        assert_eq!(t.translate_user("Guest"), "guest");
        assert_eq!(t.translate_user("alice"), "alice");
        assert_eq!(t.translate_group("Projectmanager"), "Projectmanagers");
        assert_eq!(t.translate_group("Users"), "Users");
    }
}
