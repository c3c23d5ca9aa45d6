use std::collections::HashMap;

use async_trait::async_trait;
use common::{
    ChemicalId, DosageId, OrderId, ProcessDefinitionId, ProcessEntryId, StepDefinitionId,
    StepEntryId, WashRecipeId,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    ChemicalDefinition, ChemicalDosage, ProcessDefinition, ProcessEntry, Result, StepDefinition,
    StepEntry, StoreError, WashRecipe, orders::OrderLinkage, reference::ReferenceCatalog,
    store::RecipeStore,
};

const WASH_CODE_INDEX: &str = "wash_recipes_wash_code_key";

const RECIPE_COLUMNS: &str = "id, order_id, date, wash_code, wash_type, steps, recipe_process_ids, created_at, updated_at";
const STEP_COLUMNS: &str =
    "id, wash_recipe_id, step_definition_id, time, temperature, liters, sequence, dosages";
const DOSAGE_COLUMNS: &str = "id, step_entry_id, chemical_id, quantity, unit";
const PROCESS_COLUMNS: &str =
    "id, wash_recipe_id, process_definition_id, process_type, remark, sequence";

/// PostgreSQL-backed recipe store.
///
/// Also serves the reference catalogs and the order linkage from the same
/// database, so one pool backs every collaborator of the engine.
#[derive(Clone)]
pub struct PostgresRecipeStore {
    pool: PgPool,
}

impl PostgresRecipeStore {
    /// Creates a new PostgreSQL recipe store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_recipe(row: PgRow) -> Result<WashRecipe> {
        let steps: Vec<Uuid> = row.try_get("steps")?;
        let processes: Vec<Uuid> = row.try_get("recipe_process_ids")?;

        Ok(WashRecipe {
            id: WashRecipeId::from_uuid(row.try_get("id")?),
            order_id: row
                .try_get::<Option<Uuid>, _>("order_id")?
                .map(OrderId::from_uuid),
            date: row.try_get("date")?,
            wash_code: row.try_get("wash_code")?,
            wash_type: row.try_get("wash_type")?,
            steps: steps.into_iter().map(StepEntryId::from_uuid).collect(),
            recipe_process_ids: processes
                .into_iter()
                .map(ProcessEntryId::from_uuid)
                .collect(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_step_entry(row: PgRow) -> Result<StepEntry> {
        let dosages: Vec<Uuid> = row.try_get("dosages")?;

        Ok(StepEntry {
            id: StepEntryId::from_uuid(row.try_get("id")?),
            wash_recipe_id: WashRecipeId::from_uuid(row.try_get("wash_recipe_id")?),
            step_definition_id: StepDefinitionId::from_uuid(row.try_get("step_definition_id")?),
            time: row.try_get("time")?,
            temperature: row.try_get("temperature")?,
            liters: row.try_get("liters")?,
            sequence: decode_sequence(&row)?,
            dosages: dosages.into_iter().map(DosageId::from_uuid).collect(),
        })
    }

    fn row_to_dosage(row: PgRow) -> Result<ChemicalDosage> {
        Ok(ChemicalDosage {
            id: DosageId::from_uuid(row.try_get("id")?),
            step_entry_id: StepEntryId::from_uuid(row.try_get("step_entry_id")?),
            chemical_id: ChemicalId::from_uuid(row.try_get("chemical_id")?),
            quantity: row.try_get("quantity")?,
            unit: row.try_get("unit")?,
        })
    }

    fn row_to_process_entry(row: PgRow) -> Result<ProcessEntry> {
        Ok(ProcessEntry {
            id: ProcessEntryId::from_uuid(row.try_get("id")?),
            wash_recipe_id: WashRecipeId::from_uuid(row.try_get("wash_recipe_id")?),
            process_definition_id: ProcessDefinitionId::from_uuid(
                row.try_get("process_definition_id")?,
            ),
            process_type: row.try_get("process_type")?,
            remark: row.try_get("remark")?,
            sequence: decode_sequence(&row)?,
        })
    }
}

fn decode_sequence(row: &PgRow) -> Result<u32> {
    let raw: i64 = row.try_get("sequence")?;
    u32::try_from(raw).map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))
}

fn uuids<T: Copy + Into<Uuid>>(ids: &[T]) -> Vec<Uuid> {
    ids.iter().map(|id| (*id).into()).collect()
}

/// Maps a unique violation on the wash code index to `DuplicateKey`.
fn map_recipe_write_error(e: sqlx::Error, recipe: &WashRecipe) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.constraint() == Some(WASH_CODE_INDEX)
    {
        return StoreError::DuplicateKey {
            field: "wash_code",
            value: recipe.wash_code.clone().unwrap_or_default(),
        };
    }
    StoreError::Database(e)
}

#[async_trait]
impl RecipeStore for PostgresRecipeStore {
    async fn insert_recipe(&self, recipe: &WashRecipe) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wash_recipes (id, order_id, date, wash_code, wash_type, steps, recipe_process_ids, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(recipe.id.as_uuid())
        .bind(recipe.order_id.map(|id| id.as_uuid()))
        .bind(recipe.date)
        .bind(&recipe.wash_code)
        .bind(&recipe.wash_type)
        .bind(uuids(&recipe.steps))
        .bind(uuids(&recipe.recipe_process_ids))
        .bind(recipe.created_at)
        .bind(recipe.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_recipe_write_error(e, recipe))?;
        Ok(())
    }

    async fn update_recipe(&self, recipe: &WashRecipe) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE wash_recipes
            SET order_id = $2, date = $3, wash_code = $4, wash_type = $5,
                steps = $6, recipe_process_ids = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(recipe.id.as_uuid())
        .bind(recipe.order_id.map(|id| id.as_uuid()))
        .bind(recipe.date)
        .bind(&recipe.wash_code)
        .bind(&recipe.wash_type)
        .bind(uuids(&recipe.steps))
        .bind(uuids(&recipe.recipe_process_ids))
        .bind(recipe.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_recipe_write_error(e, recipe))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("WashRecipe", recipe.id));
        }
        Ok(())
    }

    async fn get_recipe(&self, id: WashRecipeId) -> Result<Option<WashRecipe>> {
        let row = sqlx::query(&format!(
            "SELECT {RECIPE_COLUMNS} FROM wash_recipes WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_recipe).transpose()
    }

    async fn find_recipe_by_wash_code(&self, wash_code: &str) -> Result<Option<WashRecipe>> {
        let row = sqlx::query(&format!(
            "SELECT {RECIPE_COLUMNS} FROM wash_recipes WHERE wash_code = $1"
        ))
        .bind(wash_code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_recipe).transpose()
    }

    async fn list_recipes(&self) -> Result<Vec<WashRecipe>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECIPE_COLUMNS} FROM wash_recipes ORDER BY date DESC, created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_recipe).collect()
    }

    async fn delete_recipe(&self, id: WashRecipeId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM wash_recipes WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_step_entry(&self, entry: &StepEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO step_entries (id, wash_recipe_id, step_definition_id, time, temperature, liters, sequence, dosages)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.wash_recipe_id.as_uuid())
        .bind(entry.step_definition_id.as_uuid())
        .bind(entry.time)
        .bind(entry.temperature)
        .bind(entry.liters)
        .bind(i64::from(entry.sequence))
        .bind(uuids(&entry.dosages))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_step_entry(&self, entry: &StepEntry) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE step_entries
            SET step_definition_id = $2, time = $3, temperature = $4, liters = $5,
                sequence = $6, dosages = $7
            WHERE id = $1
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.step_definition_id.as_uuid())
        .bind(entry.time)
        .bind(entry.temperature)
        .bind(entry.liters)
        .bind(i64::from(entry.sequence))
        .bind(uuids(&entry.dosages))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("StepEntry", entry.id));
        }
        Ok(())
    }

    async fn step_entries_for_recipe(&self, recipe_id: WashRecipeId) -> Result<Vec<StepEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM step_entries WHERE wash_recipe_id = $1 ORDER BY sequence ASC, position ASC"
        ))
        .bind(recipe_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_step_entry).collect()
    }

    async fn delete_step_entries(&self, ids: &[StepEntryId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM step_entries WHERE id = ANY($1)")
            .bind(uuids(ids))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_dosages(&self, dosages: &[ChemicalDosage]) -> Result<()> {
        if dosages.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for dosage in dosages {
            sqlx::query(
                r#"
                INSERT INTO chemical_dosages (id, step_entry_id, chemical_id, quantity, unit)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(dosage.id.as_uuid())
            .bind(dosage.step_entry_id.as_uuid())
            .bind(dosage.chemical_id.as_uuid())
            .bind(dosage.quantity)
            .bind(&dosage.unit)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_dosage(&self, dosage: &ChemicalDosage) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE chemical_dosages
            SET chemical_id = $2, quantity = $3, unit = $4
            WHERE id = $1
            "#,
        )
        .bind(dosage.id.as_uuid())
        .bind(dosage.chemical_id.as_uuid())
        .bind(dosage.quantity)
        .bind(&dosage.unit)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("ChemicalDosage", dosage.id));
        }
        Ok(())
    }

    async fn dosages_for_step_entries(
        &self,
        step_entry_ids: &[StepEntryId],
    ) -> Result<Vec<ChemicalDosage>> {
        if step_entry_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {DOSAGE_COLUMNS} FROM chemical_dosages WHERE step_entry_id = ANY($1) ORDER BY position ASC"
        ))
        .bind(uuids(step_entry_ids))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_dosage).collect()
    }

    async fn delete_dosages(&self, ids: &[DosageId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM chemical_dosages WHERE id = ANY($1)")
            .bind(uuids(ids))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_dosages_for_step_entries(
        &self,
        step_entry_ids: &[StepEntryId],
    ) -> Result<u64> {
        if step_entry_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM chemical_dosages WHERE step_entry_id = ANY($1)")
            .bind(uuids(step_entry_ids))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_process_entries(&self, entries: &[ProcessEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO process_entries (id, wash_recipe_id, process_definition_id, process_type, remark, sequence)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(entry.id.as_uuid())
            .bind(entry.wash_recipe_id.as_uuid())
            .bind(entry.process_definition_id.as_uuid())
            .bind(&entry.process_type)
            .bind(&entry.remark)
            .bind(i64::from(entry.sequence))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn process_entries_for_recipe(
        &self,
        recipe_id: WashRecipeId,
    ) -> Result<Vec<ProcessEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROCESS_COLUMNS} FROM process_entries WHERE wash_recipe_id = $1 ORDER BY sequence ASC, position ASC"
        ))
        .bind(recipe_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_process_entry).collect()
    }

    async fn delete_process_entries(&self, ids: &[ProcessEntryId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM process_entries WHERE id = ANY($1)")
            .bind(uuids(ids))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_process_entries_for_recipe(&self, recipe_id: WashRecipeId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM process_entries WHERE wash_recipe_id = $1")
            .bind(recipe_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ReferenceCatalog for PostgresRecipeStore {
    async fn step_definition(&self, id: StepDefinitionId) -> Result<Option<StepDefinition>> {
        let found = self.step_definitions(&[id]).await?;
        Ok(found.into_values().next())
    }

    async fn chemical(&self, id: ChemicalId) -> Result<Option<ChemicalDefinition>> {
        let found = self.chemicals(&[id]).await?;
        Ok(found.into_values().next())
    }

    async fn process_definition(
        &self,
        id: ProcessDefinitionId,
    ) -> Result<Option<ProcessDefinition>> {
        let found = self.process_definitions(&[id]).await?;
        Ok(found.into_values().next())
    }

    async fn step_definitions(
        &self,
        ids: &[StepDefinitionId],
    ) -> Result<HashMap<StepDefinitionId, StepDefinition>> {
        let rows = sqlx::query("SELECT id, name, description FROM step_definitions WHERE id = ANY($1)")
            .bind(uuids(ids))
            .fetch_all(&self.pool)
            .await?;

        let mut found = HashMap::with_capacity(rows.len());
        for row in rows {
            let id = StepDefinitionId::from_uuid(row.try_get("id")?);
            found.insert(
                id,
                StepDefinition {
                    id,
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                },
            );
        }
        Ok(found)
    }

    async fn chemicals(&self, ids: &[ChemicalId]) -> Result<HashMap<ChemicalId, ChemicalDefinition>> {
        let rows = sqlx::query(
            "SELECT id, name, default_unit FROM chemical_definitions WHERE id = ANY($1)",
        )
        .bind(uuids(ids))
        .fetch_all(&self.pool)
        .await?;

        let mut found = HashMap::with_capacity(rows.len());
        for row in rows {
            let id = ChemicalId::from_uuid(row.try_get("id")?);
            found.insert(
                id,
                ChemicalDefinition {
                    id,
                    name: row.try_get("name")?,
                    default_unit: row.try_get("default_unit")?,
                },
            );
        }
        Ok(found)
    }

    async fn process_definitions(
        &self,
        ids: &[ProcessDefinitionId],
    ) -> Result<HashMap<ProcessDefinitionId, ProcessDefinition>> {
        let rows = sqlx::query(
            "SELECT id, name, process_type FROM process_definitions WHERE id = ANY($1)",
        )
        .bind(uuids(ids))
        .fetch_all(&self.pool)
        .await?;

        let mut found = HashMap::with_capacity(rows.len());
        for row in rows {
            let id = ProcessDefinitionId::from_uuid(row.try_get("id")?);
            found.insert(
                id,
                ProcessDefinition {
                    id,
                    name: row.try_get("name")?,
                    process_type: row.try_get("process_type")?,
                },
            );
        }
        Ok(found)
    }
}

#[async_trait]
impl OrderLinkage for PostgresRecipeStore {
    async fn add_recipe_ref(&self, order_id: OrderId, recipe_id: WashRecipeId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET wash_recipes = CASE
                WHEN $2 = ANY(wash_recipes) THEN wash_recipes
                ELSE array_append(wash_recipes, $2)
            END
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(recipe_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_recipe_ref(
        &self,
        order_id: OrderId,
        recipe_id: WashRecipeId,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE orders SET wash_recipes = array_remove(wash_recipes, $2) WHERE id = $1",
        )
        .bind(order_id.as_uuid())
        .bind(recipe_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
