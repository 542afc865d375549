use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::anyhow;
use log::{debug, info};
use serde::Deserialize;
use tera::Tera;
use toml::value::Datetime;
use walkdir::WalkDir;

use crate::{
    context::Context,
    frontmatter,
    functions::{get_url::GetURL, markdown::Markdown},
    highlighter::Highlighter,
    markdown::render_content,
    page::{human_date, Page, PartialPage},
};

#[derive(Deserialize)]
struct FrontMatter {
    title: Option<String>,
    heading: Option<String>,
    date: Option<Datetime>,
    template: Option<String>,
    description: Option<String>,
}

pub struct Site {
    pub pages: BTreeMap<String, Page>,
}

impl Site {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    pub fn load(context: &Context, tera: &Tera, highlighter: &Highlighter) -> anyhow::Result<Self> {
        let static_file_extensions = HashSet::from(["png", "webp", "jpg", "jpeg", "gif", "svg"]);

        let mut site = Site::new();

        let content_dir: PathBuf = context.absolute("content");

        for entry in WalkDir::new(&content_dir).sort_by_file_name() {
            let entry = entry?;

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(&content_dir)?;

            if let Some(extension) = entry.path().extension() {
                if static_file_extensions.contains(extension.to_str().unwrap_or("")) {
                    debug!(
                        "copying {} to output",
                        context.relative(entry.path())?.display()
                    );

                    context.copy_to_output(entry.path(), relative)?;
                    continue;
                }
            }

            if entry.file_name().to_string_lossy().starts_with('_') {
                continue;
            }

            info!("compiling {}", context.relative(entry.path())?.display());

            let contents = fs::read_to_string(entry.path())?;

            let page = load_page(context, tera, highlighter, relative, &contents)
                .map_err(|e| anyhow!("{}: {e}", relative.display()))?;

            site.pages.insert(page.name.clone(), page);
        }

        Ok(site)
    }

    pub fn render(&self, context: &Context, tera: &Tera) -> anyhow::Result<()> {
        for page in self.pages.values() {
            let contents = render_page(context, tera, page)?;

            debug!("writing {}", page.output_path.display());
            context.write_to_output(&page.output_path, &contents)?;
        }

        Ok(())
    }
}

fn load_page(
    context: &Context,
    tera: &Tera,
    highlighter: &Highlighter,
    relative: &Path,
    contents: &str,
) -> anyhow::Result<Page> {
    let (frontmatter, body) = frontmatter::parse::<FrontMatter>(contents)?;

    let template_name = frontmatter.template.as_deref().unwrap_or("page.html");

    let output_path = output_path(relative, Some(template_name))?;

    let name = output_path
        .to_str()
        .ok_or_else(|| anyhow!("non-utf8 output path"))?
        .to_string();

    let permalink = context.config.make_permalink(&name)?;

    let title = match frontmatter.title {
        Some(title) => title,
        None => relative
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
    };

    if title.trim().is_empty() {
        return Err(anyhow!("page has an empty title"));
    }

    let partial = PartialPage {
        title,
        date: frontmatter.date.and_then(|d| d.date).map(|d| d.to_string()),
        description: frontmatter.description.unwrap_or_default(),
        permalink,
    };

    let content = render_content(body, &partial, tera, highlighter)?;

    let updated = partial.date.as_deref().map(human_date).transpose()?;

    Ok(Page {
        name,
        output_path,
        template_name: template_name.to_string(),
        title: partial.title,
        heading: frontmatter.heading,
        description: partial.description,
        date: partial.date,
        updated,
        content,
        permalink: partial.permalink,
    })
}

/// `faq.md` rendered as html lands in `faq/index.html`, `index.md` stays
/// `index.html`; any other template extension replaces the source one.
pub fn output_path(relative_path: &Path, template_name: Option<&str>) -> anyhow::Result<PathBuf> {
    let mut output_path = relative_path.with_extension("");
    if let Some(extension) = Path::new(template_name.unwrap_or("")).extension() {
        if extension.eq("html") {
            let is_index = output_path
                .file_name()
                .map(|n| n.eq("index"))
                .ok_or_else(|| anyhow!("no file name in {}", relative_path.display()))?;
            if is_index {
                output_path.pop();
            }
            output_path = output_path.join("index.html");
        } else {
            output_path = output_path.with_extension(extension);
        }
    }

    Ok(output_path)
}

pub fn render_page(context: &Context, tera: &Tera, page: &Page) -> anyhow::Result<String> {
    let mut ctx = tera::Context::new();

    ctx.insert("config", &context.config);
    ctx.insert("page", page);
    ctx.insert("current_url", &page.permalink);

    Ok(tera.render(&page.template_name, &ctx)?)
}

pub fn setup_template_engine(context: &Context) -> anyhow::Result<Tera> {
    let template_dir = context.absolute("templates");

    let mut tera = Tera::new(&template_dir.join("**").join("*").to_string_lossy())?;

    debug!(
        "loaded templates: {:?}",
        tera.get_template_names().collect::<Vec<_>>()
    );

    tera.register_function("get_url", GetURL::new(context.config.base_url.clone()));
    tera.register_filter("markdown", Markdown {});

    Ok(tera)
}

fn copy_static_files(context: &Context) -> anyhow::Result<()> {
    let static_dir: PathBuf = context.absolute("static");

    if !static_dir.is_dir() {
        return Ok(());
    }

    for entry in WalkDir::new(&static_dir) {
        let entry = entry?;

        if !entry.file_type().is_file() {
            continue;
        }

        context.copy_to_output(entry.path(), entry.path().strip_prefix(&static_dir)?)?;
    }

    Ok(())
}

pub fn build(context: &Context) -> anyhow::Result<Site> {
    context.clean_output_dir()?;

    copy_static_files(context)?;

    let highlighter = Highlighter::new(context)?;

    let tera = setup_template_engine(context)?;

    let site = Site::load(context, &tera, &highlighter)?;

    site.render(context, &tera)?;

    info!(
        "wrote {} pages to {}",
        site.pages.len(),
        context.output_dir.display()
    );

    Ok(site)
}
