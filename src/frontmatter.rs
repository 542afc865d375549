use anyhow::anyhow;

const MARKER: &str = "+++";

pub fn parse<D>(data: &str) -> anyhow::Result<(D, &str)>
where
    D: serde::de::DeserializeOwned,
{
    let start = data
        .find(MARKER)
        .ok_or_else(|| anyhow!("missing frontmatter"))?;

    if start != 0 {
        return Err(anyhow!("frontmatter not at beginning of file"));
    }

    let start = start + MARKER.len();

    let end = data[start..]
        .find(MARKER)
        .ok_or_else(|| anyhow!("unterminated frontmatter"))?;

    let frontmatter = &data[start..start + end];

    let end = start + end + MARKER.len();
    let extra = &data[end..];

    Ok((toml::from_str::<D>(frontmatter.trim())?, extra.trim_start()))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::parse;

    #[derive(Deserialize, Debug)]
    struct Header {
        title: String,
        template: Option<String>,
    }

    #[test]
    fn splits_header_and_body() {
        let input = "+++\ntitle = \"about\"\n+++\n\n## What's PORUS?\n";
        let (header, body) = parse::<Header>(input).unwrap();

        assert_eq!(header.title, "about");
        assert_eq!(header.template, None);
        assert_eq!(body, "## What's PORUS?\n");
    }

    #[test]
    fn rejects_missing_frontmatter() {
        let err = parse::<Header>("## no header here").unwrap_err();
        assert_eq!(err.to_string(), "missing frontmatter");
    }

    #[test]
    fn rejects_late_frontmatter() {
        let err = parse::<Header>("text\n+++\ntitle = \"x\"\n+++\n").unwrap_err();
        assert_eq!(err.to_string(), "frontmatter not at beginning of file");
    }

    #[test]
    fn rejects_unterminated_frontmatter() {
        let err = parse::<Header>("+++\ntitle = \"x\"\n").unwrap_err();
        assert_eq!(err.to_string(), "unterminated frontmatter");
    }

    #[test]
    fn reports_bad_toml() {
        assert!(parse::<Header>("+++\ntemplate = \"faq.html\"\n+++\nbody").is_err());
    }
}
