//! Placeholder substitution for event text.
//!
//! Template strings name participants by role token (`m_c`, `r_c`, `s_c`,
//! `app1`, `n_c:0`) and carry brace placeholders for pronouns, verb
//! agreement and snippet lists. Group names `c_n` and `o_c_n` become the
//! clan and the rival clan in play.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use clan_state::{Cat, CatId, Clan, Pronouns, Role};

/// Snippet category -> phrases, loaded from `snippets.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snippets {
    categories: BTreeMap<String, Vec<String>>,
}

impl Snippets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: impl Into<String>, phrases: Vec<String>) {
        self.categories.insert(category.into(), phrases);
    }

    pub fn get(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(|p| p.as_slice())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Everything the renderer reads.
pub struct TextContext<'a> {
    pub clan: &'a Clan,
    pub bindings: &'a BTreeMap<Role, CatId>,
    pub other_clan: Option<&'a str>,
    pub snippets: &'a Snippets,
}

impl<'a> TextContext<'a> {
    fn cat(&self, role: Role) -> Option<&'a Cat> {
        self.bindings.get(&role).and_then(|id| self.clan.cat(id))
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

/// Splits `text` into runs of token characters and everything else.
fn runs(text: &str) -> impl Iterator<Item = (bool, &str)> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let is_token = is_token_char(first);
        let end = rest
            .char_indices()
            .find(|(_, c)| is_token_char(*c) != is_token)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        rest = tail;
        Some((is_token, run))
    })
}

/// Role tokens that appear anywhere in `text`, brace placeholders included.
pub fn role_tokens(text: &str) -> impl Iterator<Item = Role> + '_ {
    runs(text)
        .filter(|(is_token, _)| *is_token)
        .filter_map(|(_, run)| run.trim_end_matches(':').parse::<Role>().ok())
}

/// Substitutes every placeholder in `template`.
pub fn render<R: Rng>(template: &str, ctx: &TextContext<'_>, rng: &mut R) -> String {
    let expanded = expand_braces(template, ctx, rng);
    substitute_tokens(&expanded, ctx)
}

fn expand_braces<R: Rng>(text: &str, ctx: &TextContext<'_>, rng: &mut R) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let inner = &after[..end];
        match expand_placeholder(inner, ctx, rng) {
            Some(replacement) => out.push_str(&replacement),
            None => {
                debug!("Leaving unknown placeholder {{{}}}", inner);
                out.push('{');
                out.push_str(inner);
                out.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn expand_placeholder<R: Rng>(inner: &str, ctx: &TextContext<'_>, rng: &mut R) -> Option<String> {
    let parts: Vec<&str> = inner.split('/').collect();
    match parts.as_slice() {
        ["PRONOUN", role, kind] => pronoun(ctx, role, kind),
        ["PRONOUN", role, kind, "CAP"] => pronoun(ctx, role, kind).map(|p| capitalize(&p)),
        ["VERB", role, plural, singular] => {
            let cat = ctx.cat(role.parse().ok()?)?;
            let form = if cat.pronouns.plural { plural } else { singular };
            Some(form.to_string())
        }
        ["SNIPPET", category, count] => {
            let phrases = ctx.snippets.get(category)?;
            let count: usize = count.parse().ok()?;
            let picked: Vec<&String> = phrases.choose_multiple(rng, count).collect();
            if picked.is_empty() {
                return None;
            }
            Some(join_list(&picked))
        }
        _ => None,
    }
}

fn pronoun(ctx: &TextContext<'_>, role: &str, kind: &str) -> Option<String> {
    let cat = ctx.cat(role.parse().ok()?)?;
    pronoun_form(&cat.pronouns, kind).map(str::to_string)
}

fn pronoun_form<'p>(pronouns: &'p Pronouns, kind: &str) -> Option<&'p str> {
    match kind {
        "subject" => Some(&pronouns.subject),
        "object" => Some(&pronouns.object),
        "poss" => Some(&pronouns.poss),
        "inposs" => Some(&pronouns.inposs),
        "self" => Some(&pronouns.reflexive),
        _ => None,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Joins as `a`, `a and b` or `a, b and c`.
fn join_list(items: &[&String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(|s| s.as_str()).collect();
            format!("{} and {}", head.join(", "), last)
        }
    }
}

fn substitute_tokens(text: &str, ctx: &TextContext<'_>) -> String {
    let mut out = String::with_capacity(text.len());

    for (is_token, run) in runs(text) {
        if !is_token {
            out.push_str(run);
            continue;
        }
        let token = run.trim_end_matches(':');
        let trailing = &run[token.len()..];

        match token {
            "c_n" => push_group_name(&mut out, &format!("{}Clan", ctx.clan.name)),
            "o_c_n" => match ctx.other_clan {
                Some(name) => push_group_name(&mut out, &format!("{}Clan", name)),
                None => {
                    debug!("No other clan in play for o_c_n");
                    out.push_str(token);
                }
            },
            _ => match token.parse::<Role>() {
                Ok(role) => match ctx.cat(role) {
                    Some(cat) => out.push_str(&cat.name),
                    None => {
                        debug!("Leaving unbound role token {}", token);
                        out.push_str(token);
                    }
                },
                Err(_) => out.push_str(token),
            },
        }
        out.push_str(trailing);
    }
    out
}

/// Appends a group name, turning a preceding `a` into `an` before a vowel.
fn push_group_name(out: &mut String, name: &str) {
    let starts_with_vowel = name
        .chars()
        .next()
        .map(|c| "AEIOUaeiou".contains(c))
        .unwrap_or(false);
    if starts_with_vowel && (out.ends_with("a ") || out.ends_with("A ")) {
        let article_start = out.len() - 2;
        let standalone = out[..article_start]
            .chars()
            .next_back()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        if standalone {
            out.insert(article_start + 1, 'n');
        }
    }
    out.push_str(name);
}
