use tracing::info;

use super::PettyCashService;
use crate::access::Actor;
use crate::entities::{non_empty, Category, CategoryInput, CategoryRemoval};
use crate::repositories::{CategoryRepository, EntryRepository};
use crate::{PettyCashError, PettyCashResult};

impl PettyCashService {
    pub async fn categories(&self, include_inactive: bool) -> PettyCashResult<Vec<Category>> {
        CategoryRepository::list(&self.pool, include_inactive).await
    }

    pub async fn category(&self, id: i64) -> PettyCashResult<Category> {
        CategoryRepository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| PettyCashError::NotFound(format!("category #{id}")))
    }

    pub async fn create_category(
        &self,
        actor: &Actor,
        input: &CategoryInput,
    ) -> PettyCashResult<Category> {
        actor.require_manager()?;
        let name = validate_category(input)?;
        let description = non_empty(&input.description);

        let id = CategoryRepository::insert(
            &self.pool,
            &name,
            description.as_deref(),
            input.budget_limit,
            input.is_active.unwrap_or(true),
        )
        .await?;
        info!(category = %name, id, "petty cash category created");
        self.category(id).await
    }

    pub async fn update_category(
        &self,
        actor: &Actor,
        id: i64,
        input: &CategoryInput,
    ) -> PettyCashResult<Category> {
        actor.require_manager()?;
        let current = self.category(id).await?;
        let name = validate_category(input)?;
        let description = non_empty(&input.description);

        CategoryRepository::update(
            &self.pool,
            current.id,
            &name,
            description.as_deref(),
            input.budget_limit,
            input.is_active.unwrap_or(current.is_active),
        )
        .await?;
        info!(category = %name, id, "petty cash category updated");
        self.category(id).await
    }

    /// Delete a category, or deactivate it when entries still use it.
    pub async fn remove_category(
        &self,
        actor: &Actor,
        id: i64,
    ) -> PettyCashResult<CategoryRemoval> {
        actor.require_manager()?;
        let category = self.category(id).await?;

        if EntryRepository::count_for_category(&self.pool, id).await? > 0 {
            CategoryRepository::deactivate(&self.pool, id).await?;
            info!(category = %category.name, "petty cash category in use, deactivated");
            return Ok(CategoryRemoval::Deactivated);
        }

        CategoryRepository::delete(&self.pool, id).await?;
        info!(category = %category.name, "petty cash category deleted");
        Ok(CategoryRemoval::Deleted)
    }
}

fn validate_category(input: &CategoryInput) -> PettyCashResult<String> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(PettyCashError::Validation("category name is required".into()));
    }
    if let Some(limit) = input.budget_limit {
        if !limit.is_finite() || limit < 0.0 {
            return Err(PettyCashError::Validation(
                "budget limit cannot be negative".into(),
            ));
        }
    }
    Ok(name.to_string())
}
