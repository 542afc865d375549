use anyhow::anyhow;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Tag};
use std::{ops::Range, str::FromStr};
use tera::Tera;
use url::Url;

use combine::{
    between,
    parser::{
        char::{spaces, string as Str},
        range::take_while,
        repeat::SepBy,
    },
    sep_by, EasyParser, Parser, Stream,
};

use crate::{highlighter::Highlighter, page::PartialPage};

#[derive(Clone, Debug, PartialEq)]
pub struct Argument {
    name: String,
    value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShortCode {
    name: String,
    arguments: Vec<Argument>,
}

pub fn lit<I>(l: &'static str) -> impl Parser<I, Output = String>
where
    I: Stream<Token = char>,
{
    Str(l).map(|s| s.to_string()).skip(spaces())
}

fn parse_shortcode(input: &str) -> anyhow::Result<ShortCode> {
    let ident = || take_while(|c: char| c.is_alphanumeric() || c == '_').skip(spaces());
    let literal_str = between(lit("\""), lit("\""), take_while(|c: char| c != '\"')).skip(spaces());
    let arg = (ident(), lit("="), literal_str).map(|t: (&str, String, &str)| Argument {
        name: t.0.to_string(),
        value: t.2.to_string(),
    });
    let arg_list: SepBy<Vec<_>, _, _> = sep_by(arg, lit(","));
    let args = between(lit("("), lit(")"), arg_list);

    let mut function = between(
        lit("{{"),
        lit("}}"),
        (ident(), args).map(|t: (&str, _)| ShortCode {
            name: t.0.to_string(),
            arguments: t.1,
        }),
    );

    let result = function
        .easy_parse(input)
        .map_err(|e| e.map_range(|r| format!("{:?}", r)))
        .map_err(|e| e.map_position(|p| p.translate_position(input)))?;

    if result.0.name.is_empty() {
        return Err(anyhow!("shortcode without a name: {input}"));
    }

    Ok(result.0)
}

pub fn render_shortcode(input: &str, page: &PartialPage, tera: &Tera) -> anyhow::Result<String> {
    let shortcode = parse_shortcode(input)?;

    for template in tera.get_template_names() {
        if let Some(name) = template.strip_prefix("shortcodes/") {
            let short_name = match name.rfind('.') {
                Some(i) => &name[0..i],
                None => name,
            };

            if short_name == shortcode.name {
                let mut ctx = tera::Context::new();

                for arg in &shortcode.arguments {
                    ctx.insert(&arg.name, &arg.value);
                }

                ctx.insert("page", page);

                return Ok(tera.render(template, &ctx)?);
            }
        }
    }

    Err(anyhow!("unknown shortcode '{}'", shortcode.name))
}

/// Replaces every shortcode in `input` with its rendered template, leaving
/// the surrounding text untouched. `{{` inside code spans and code blocks
/// is kept as is.
pub fn expand_shortcodes(input: &str, page: &PartialPage, tera: &Tera) -> anyhow::Result<String> {
    let code = code_ranges(input);

    let mut output = String::with_capacity(input.len());
    let mut last = 0;
    let mut search = 0;

    while let Some(found) = input[search..].find("{{") {
        let start = search + found;

        if let Some(range) = code.iter().find(|r| r.contains(&start)) {
            search = range.end;
            continue;
        }

        output.push_str(&input[last..start]);

        let end = input[start..]
            .find("}}")
            .ok_or_else(|| anyhow!("unterminated shortcode"))?;
        let end = start + end + 2;

        output.push_str(render_shortcode(&input[start..end], page, tera)?.trim_end());
        last = end;
        search = end;
    }

    output.push_str(&input[last..]);

    Ok(output)
}

fn code_ranges(input: &str) -> Vec<Range<usize>> {
    pulldown_cmark::Parser::new(input)
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Start(Tag::CodeBlock(_)) | Event::Code(_) => Some(range),
            _ => None,
        })
        .collect()
}

pub fn render_markdown(
    input: &str,
    page: &PartialPage,
    highlighter: &Highlighter,
) -> anyhow::Result<String> {
    let mut events = vec![];

    let mut in_code_block = false;
    let mut lang = String::new();
    let mut code = String::new();

    for event in pulldown_cmark::Parser::new(input) {
        match event {
            Event::Start(Tag::Image(link_type, mut dest_url, title)) => {
                // relative image urls would break once the page is served
                // from its permalink, so pin them to it
                if Url::from_str(&dest_url).is_err() {
                    let result = page.permalink.join(&dest_url).map_err(|e| {
                        anyhow!("bad image url '{dest_url}' in '{}': {e}", page.title)
                    })?;
                    dest_url = result.to_string().into();
                }
                events.push(Event::Start(Tag::Image(link_type, dest_url, title)));
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                lang = if let CodeBlockKind::Fenced(name) = kind {
                    name.to_string()
                } else {
                    "".to_string()
                };
            }
            Event::Text(t) if in_code_block => {
                code.push_str(&t);
            }
            Event::End(Tag::CodeBlock(_)) if in_code_block => {
                let result = highlighter.highlight(&lang, &code)?;

                events.push(Event::Html(CowStr::from(result)));

                in_code_block = false;
                code = String::new();
            }
            _ => events.push(event),
        }
    }

    let mut contents = String::new();
    html::push_html(&mut contents, events.into_iter());

    Ok(contents)
}

pub fn render_content(
    input: &str,
    page: &PartialPage,
    tera: &Tera,
    highlighter: &Highlighter,
) -> anyhow::Result<String> {
    let expanded = expand_shortcodes(input, page, tera)?;

    render_markdown(&expanded, page, highlighter)
}
