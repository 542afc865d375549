use anyhow::anyhow;
use log::debug;
use syntect::{
    highlighting::{Theme, ThemeSet},
    html::highlighted_html_for_string,
    parsing::SyntaxSet,
};

use crate::context::Context;

pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl Highlighter {
    pub fn new(context: &Context) -> anyhow::Result<Self> {
        let mut syntax_set_builder = SyntaxSet::load_defaults_newlines().into_builder();

        // extra .sublime-syntax definitions are optional
        let syntaxes = context.absolute("syntaxes");
        if syntaxes.is_dir() {
            debug!("loading syntaxes from {}", syntaxes.display());
            syntax_set_builder.add_from_folder(&syntaxes, true)?;
        }
        let syntax_set = syntax_set_builder.build();

        let mut theme_set = ThemeSet::load_defaults();
        let theme_name = &context.config.highlight_theme;
        let theme = theme_set
            .themes
            .remove(theme_name)
            .ok_or_else(|| anyhow!("unknown highlight theme '{theme_name}'"))?;

        Ok(Self { syntax_set, theme })
    }

    pub fn highlight(&self, lang: &str, input: &str) -> anyhow::Result<String> {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        Ok(highlighted_html_for_string(
            input,
            &self.syntax_set,
            syntax,
            &self.theme,
        )?)
    }
}
