//! Prompt template management module.
//!
//! Templates live in `templates/prompts/` and use Jinja2 syntax.

pub mod engine;

pub use engine::{render_template, TemplateError};

use minijinja::Value;
use std::collections::HashMap;

/// System and user messages sent upstream for one coaching request
#[derive(Debug, Clone)]
pub struct CoachingPrompt {
    pub system: String,
    pub user: String,
}

/// Render the coaching prompts for a caller-described situation.
pub fn render_coaching_prompt(situation: &str) -> Result<CoachingPrompt, TemplateError> {
    let system = render_template("joycoach/system.jinja", &HashMap::new())?;

    let mut ctx: HashMap<&str, Value> = HashMap::new();
    ctx.insert("situation", Value::from(situation));
    let user = render_template("joycoach/user.jinja", &ctx)?;

    Ok(CoachingPrompt { system, user })
}
