use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use tracing::debug;

use entity::study_resource;

use crate::access::{TYPE_MINDMAP, TYPE_SYLLABUS_ANALYSIS};
use crate::error::{AppError, AppResult};
use crate::util::cents_to_f64;

pub async fn find_resource<C: ConnectionTrait>(db: &C, id: i32) -> AppResult<Option<study_resource::Model>> {
    Ok(study_resource::Entity::find_by_id(id).one(db).await?)
}

pub async fn find_by_title<C: ConnectionTrait>(db: &C, title: &str) -> AppResult<Option<study_resource::Model>> {
    Ok(study_resource::Entity::find()
        .filter(study_resource::Column::Title.eq(title.trim()))
        .one(db)
        .await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceBrief {
    pub id: i32,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub level: String,
}

pub async fn list_brief<C: ConnectionTrait>(db: &C) -> AppResult<Vec<ResourceBrief>> {
    let rows = study_resource::Entity::find()
        .order_by_asc(study_resource::Column::Id)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| ResourceBrief {
            id: r.id,
            title: r.title,
            kind: r.r#type,
            level: r.level,
        })
        .collect())
}

/// Public catalog view of a resource. Prices are in currency units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceView {
    pub id: i32,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub level: String,
    pub chapter: String,
    pub file_path: String,
    pub image: String,
    pub price: f64,
}

impl From<study_resource::Model> for ResourceView {
    fn from(r: study_resource::Model) -> Self {
        let chapter = r.chapter_or_all().to_string();
        Self {
            id: r.id,
            title: r.title,
            description: r.description.unwrap_or_default(),
            kind: r.r#type,
            level: r.level,
            chapter,
            file_path: r.file_path.unwrap_or_default(),
            image: r.image.unwrap_or_else(|| "/default.jpg".to_string()),
            price: cents_to_f64(r.price_cents),
        }
    }
}

pub async fn random_resources<C: ConnectionTrait>(db: &C, count: u64) -> AppResult<Vec<ResourceView>> {
    let rows = study_resource::Entity::find()
        .order_by(Expr::cust("RANDOM()"), Order::Asc)
        .limit(count)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(ResourceView::from).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterOption {
    pub chapter: String,
    pub title: String,
    pub file_path: String,
    pub description: String,
    pub image: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourcePage {
    #[serde(flatten)]
    pub resource: ResourceView,
    pub options: Vec<ChapterOption>,
}

/// What a product-page slug asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugQuery {
    pub kind: String,
    pub level: String,
    /// `None` selects the `All` row.
    pub chapter: Option<String>,
}

/// Parse the fixed slugs and `"AS Mindmap Chapter N"`. Anything else is looked up as a title.
pub fn parse_slug(slug: &str) -> Option<SlugQuery> {
    let fixed = |kind: &str, level: &str| SlugQuery {
        kind: kind.to_string(),
        level: level.to_string(),
        chapter: None,
    };
    match slug {
        "as-mindmap" => return Some(fixed(TYPE_MINDMAP, "AS")),
        "a2-mindmap" => return Some(fixed(TYPE_MINDMAP, "A2")),
        "as-syllabus-analysis" => return Some(fixed(TYPE_SYLLABUS_ANALYSIS, "AS")),
        "a2-syllabus-analysis" => return Some(fixed(TYPE_SYLLABUS_ANALYSIS, "A2")),
        _ => {}
    }

    let (level, chapter) = slug.split_once(" Mindmap Chapter ")?;
    let valid_chapter = chapter == "All" || (!chapter.is_empty() && chapter.bytes().all(|b| b.is_ascii_digit()));
    if !matches!(level, "AS" | "A2") || !valid_chapter {
        return None;
    }
    Some(SlugQuery {
        kind: TYPE_MINDMAP.to_string(),
        level: level.to_string(),
        chapter: (chapter != "All").then(|| chapter.to_string()),
    })
}

/// `All` first, then by the numeric part of the chapter.
fn chapter_rank(chapter: &str) -> u64 {
    if chapter == "All" {
        return 0;
    }
    chapter
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse::<u64>()
        .map_or(u64::MAX, |n| n + 1)
}

fn chapter_label(chapter: &str) -> String {
    format!("Chapter {chapter}")
}

pub async fn resolve_page<C: ConnectionTrait>(db: &C, slug: &str) -> AppResult<ResourcePage> {
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(AppError::bad_request("Missing slug parameter"));
    }

    let query = match parse_slug(slug) {
        Some(q) => q,
        None => {
            let Some(direct) = find_by_title(db, slug).await? else {
                return Err(AppError::not_found(format!("Unknown resource: {slug}")));
            };
            SlugQuery {
                kind: direct.r#type.clone(),
                level: direct.level.clone(),
                chapter: direct.chapter.clone().filter(|c| c != "All"),
            }
        }
    };
    debug!(?query, "resolving resource page");

    let chapter_cond = match query.chapter.as_deref() {
        Some(ch) => Condition::all().add(study_resource::Column::Chapter.eq(ch)),
        None => Condition::any()
            .add(study_resource::Column::Chapter.eq("All"))
            .add(study_resource::Column::Chapter.is_null()),
    };
    let main = study_resource::Entity::find()
        .filter(study_resource::Column::Type.eq(query.kind.as_str()))
        .filter(study_resource::Column::Level.eq(query.level.as_str()))
        .filter(chapter_cond)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Resource not found"))?;

    let mut options = Vec::new();
    if query.kind == TYPE_MINDMAP {
        let mut chapters = study_resource::Entity::find()
            .filter(study_resource::Column::Type.eq(query.kind.as_str()))
            .filter(study_resource::Column::Level.eq(query.level.as_str()))
            .all(db)
            .await?;
        chapters.sort_by_key(|r| chapter_rank(r.chapter_or_all()));
        options = chapters
            .into_iter()
            .map(|r| {
                let view = ResourceView::from(r);
                ChapterOption {
                    chapter: chapter_label(&view.chapter),
                    title: view.title,
                    file_path: view.file_path,
                    description: view.description,
                    image: view.image,
                    price: view.price,
                }
            })
            .collect();
    }

    Ok(ResourcePage {
        resource: ResourceView::from(main),
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slugs() {
        assert_eq!(
            parse_slug("as-mindmap"),
            Some(SlugQuery {
                kind: "Mindmap".into(),
                level: "AS".into(),
                chapter: None
            })
        );
        assert_eq!(
            parse_slug("A2 Mindmap Chapter 14").unwrap().chapter.as_deref(),
            Some("14")
        );
        assert_eq!(parse_slug("AS Mindmap Chapter All").unwrap().chapter, None);
        assert_eq!(parse_slug("B1 Mindmap Chapter 3"), None);
        assert_eq!(parse_slug("AS Mindmap Chapter x"), None);
        assert_eq!(parse_slug("Some Title"), None);
    }

    #[test]
    fn chapters_sort_all_first_then_numeric() {
        let mut chapters = vec!["10", "2", "All", "1"];
        chapters.sort_by_key(|c| chapter_rank(c));
        assert_eq!(chapters, vec!["All", "1", "2", "10"]);
    }
}
