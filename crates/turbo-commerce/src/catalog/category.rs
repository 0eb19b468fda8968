//! Product categories.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use turbo_cache::{Namespace, StrategyKind};
use turbo_query::{DomainKeys, EntityQueries, EntityService, Identify, QueryClient, ReadService};

use crate::ids::CategoryId;

pub const DOMAIN: &str = "categories";

/// Key builder for categories.
pub fn keys(namespace: &Namespace) -> DomainKeys {
    DomainKeys::new(namespace.clone(), DOMAIN)
}

/// A category in a hierarchical tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub handle: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Parent category (None for root).
    #[serde(default)]
    pub parent_category_id: Option<CategoryId>,
    /// Sort position among siblings.
    #[serde(default)]
    pub rank: u32,
    /// Expanded children, when the backend includes them.
    #[serde(default)]
    pub category_children: Vec<Category>,
}

impl Category {
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            handle: handle.into(),
            description: None,
            parent_category_id: None,
            rank: 0,
            category_children: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<CategoryId>) -> Self {
        self.parent_category_id = Some(parent.into());
        self
    }

    /// Check if this is a root category.
    pub fn is_root(&self) -> bool {
        self.parent_category_id.is_none()
    }

    /// Find a category by id in this subtree.
    pub fn find(&self, id: &CategoryId) -> Option<&Category> {
        if &self.id == id {
            return Some(self);
        }
        self.category_children.iter().find_map(|c| c.find(id))
    }
}

impl Identify for Category {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// Nest a flat category list under its roots, children ordered by rank.
///
/// Categories whose parent is not in the list are treated as roots.
pub fn build_tree(categories: Vec<Category>) -> Vec<Category> {
    let ids: HashSet<CategoryId> = categories.iter().map(|c| c.id.clone()).collect();
    let (roots, children): (Vec<_>, Vec<_>) = categories
        .into_iter()
        .partition(|c| c.parent_category_id.as_ref().map_or(true, |p| !ids.contains(p)));

    let mut by_parent: HashMap<CategoryId, Vec<Category>> = HashMap::new();
    for child in children {
        if let Some(parent) = child.parent_category_id.clone() {
            by_parent.entry(parent).or_default().push(child);
        }
    }

    fn attach(mut node: Category, by_parent: &mut HashMap<CategoryId, Vec<Category>>) -> Category {
        let mut children = by_parent.remove(&node.id).unwrap_or_default();
        children.sort_by_key(|c| c.rank);
        node.category_children = children.into_iter().map(|c| attach(c, by_parent)).collect();
        node
    }

    let mut roots: Vec<Category> = roots.into_iter().map(|r| attach(r, &mut by_parent)).collect();
    roots.sort_by_key(|c| c.rank);
    roots
}

/// Category list filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryListParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Restrict to children of a parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_category_id: Option<CategoryId>,
    /// Only top-level categories.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub roots_only: bool,
    /// Ask the backend to expand children.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub include_descendants_tree: bool,
}

pub type CategoryQueries = EntityQueries<Category, CategoryListParams>;

/// Category operations on the static profile.
pub fn category_queries(
    client: &QueryClient,
    reader: Arc<dyn ReadService<Category, CategoryListParams>>,
) -> CategoryQueries {
    client.entity(DOMAIN, EntityService::from_reader(reader), StrategyKind::Static)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use turbo_data::{CancellationToken, ListRequest, ListResponse, ServiceError, ServiceResult};
    use turbo_query::{DetailInput, ListInput};

    #[test]
    fn test_build_tree() {
        let tree = build_tree(vec![
            Category::new("pcat_phones", "Phones", "phones").with_parent("pcat_el"),
            Category::new("pcat_el", "Electronics", "electronics"),
            Category {
                rank: 1,
                ..Category::new("pcat_tv", "TV", "tv").with_parent("pcat_el")
            },
            Category::new("pcat_orphan", "Orphan", "orphan").with_parent("pcat_gone"),
        ]);

        assert_eq!(tree.len(), 2);
        let electronics = &tree[0];
        assert!(electronics.is_root());
        let children: Vec<_> = electronics.category_children.iter().map(|c| c.handle.as_str()).collect();
        assert_eq!(children, ["phones", "tv"]);
        assert!(electronics.find(&CategoryId::new("pcat_tv")).is_some());
        assert_eq!(tree[1].handle, "orphan");
    }

    #[test]
    fn test_list_params_key_shape() {
        let params = CategoryListParams {
            roots_only: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!({ "roots_only": true }));
    }

    struct FakeCategories;

    #[async_trait]
    impl ReadService<Category, CategoryListParams> for FakeCategories {
        async fn list(
            &self,
            _request: ListRequest<CategoryListParams>,
            _cancel: CancellationToken,
        ) -> ServiceResult<ListResponse<Category>> {
            Ok(ListResponse::new(vec![Category::new("pcat_el", "Electronics", "electronics")], 1))
        }

        async fn retrieve(&self, id: String, _params: (), _cancel: CancellationToken) -> ServiceResult<Option<Category>> {
            Err(ServiceError::not_found(format!("category {id}")))
        }
    }

    #[tokio::test]
    async fn test_queries() {
        let categories = category_queries(&QueryClient::default(), Arc::new(FakeCategories));
        let cancel = CancellationToken::new();

        let page = categories
            .list(ListInput::new(CategoryListParams::default()), &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.pagination.total_pages, 1);

        let missing = categories.detail(DetailInput::new("pcat_gone"), &cancel).await.unwrap();
        assert_eq!(missing, None);
    }
}
