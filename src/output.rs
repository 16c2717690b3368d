use std::io::{self, Write};

use serde::Serialize;

use crate::page::{Page, PageSummary};
use crate::query::Entity;
use crate::sift::SiftNode;

#[derive(Debug, Clone, Serialize)]
pub struct NodeResult {
    pub found: bool,
    pub node: Option<SiftNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResult<'a, T: Serialize> {
    #[serde(flatten)]
    pub summary: PageSummary,
    pub items: &'a [T],
}

impl<'a, E: Entity + Serialize> From<&'a Page<'_, E>> for PageResult<'a, E> {
    fn from(page: &'a Page<'_, E>) -> Self {
        Self {
            summary: page.summary(),
            items: &page.items,
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_node(node: Option<SiftNode>) -> io::Result<()> {
        Self::print_json(&NodeResult {
            found: node.is_some(),
            node,
        })
    }

    pub fn print_page<E: Entity + Serialize>(page: &Page<'_, E>) -> io::Result<()> {
        Self::print_json(&PageResult::from(page))
    }

    pub fn print_document(document: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(document.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
