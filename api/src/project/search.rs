use std::{cmp::Ordering, str::FromStr};

use serde::Deserialize;

use crate::{models::project::Project, store::Direction};

/// Which part of a project a search query is matched against.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectFilter {
    #[default]
    Title,
    Tags,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortField {
    Title,
    Tags,
    CreatedAt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProjectSort {
    pub field: SortField,
    pub order: Direction,
}

impl Default for ProjectSort {
    fn default() -> Self {
        ProjectSort {
            field: SortField::CreatedAt,
            order: Direction::Desc,
        }
    }
}

// Written as `<field>-<order>`, e.g. `created_at-desc`
impl FromStr for ProjectSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, order) = s
            .rsplit_once('-')
            .ok_or_else(|| format!("invalid sort `{s}`, expected `<field>-<asc|desc>`"))?;

        let field = match field {
            "title" => SortField::Title,
            "tags" => SortField::Tags,
            "created_at" => SortField::CreatedAt,
            other => return Err(format!("cannot sort by `{other}`")),
        };
        let order = match order {
            "asc" => Direction::Asc,
            "desc" => Direction::Desc,
            other => return Err(format!("invalid sort order `{other}`")),
        };

        Ok(ProjectSort { field, order })
    }
}

impl<'de> Deserialize<'de> for ProjectSort {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ProjectQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub filter: ProjectFilter,
    #[serde(default)]
    pub sort: ProjectSort,
}

impl ProjectQuery {
    pub fn apply<T: AsRef<Project>>(&self, projects: Vec<T>) -> Vec<T> {
        let mut projects = filter_projects(projects, self.q.as_deref().unwrap_or(""), self.filter);
        sort_projects(&mut projects, self.sort);
        projects
    }
}

/// Case-insensitive substring match on the title, or on any tag. A blank
/// query keeps everything.
pub fn filter_projects<T: AsRef<Project>>(
    projects: Vec<T>,
    query: &str,
    filter: ProjectFilter,
) -> Vec<T> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return projects;
    }

    projects
        .into_iter()
        .filter(|p| {
            let p = p.as_ref();
            match filter {
                ProjectFilter::Title => p.title.to_lowercase().contains(&query),
                ProjectFilter::Tags => p.tags.iter().any(|t| t.to_lowercase().contains(&query)),
            }
        })
        .collect()
}

/// Stable sort, so projects that compare equal keep their fetched order.
pub fn sort_projects<T: AsRef<Project>>(projects: &mut [T], sort: ProjectSort) {
    let compare = |a: &T, b: &T| -> Ordering {
        let (a, b) = (a.as_ref(), b.as_ref());
        match sort.field {
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Tags => tag_key(a).cmp(&tag_key(b)),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        }
    };

    match sort.order {
        Direction::Asc => projects.sort_by(compare),
        Direction::Desc => projects.sort_by(|a, b| compare(b, a)),
    }
}

fn tag_key(project: &Project) -> String {
    project.tags.join(" ").to_lowercase()
}
