use rusqlite::params;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::db::query::{self, decimal_text};
use crate::error::{BoqError, Entity, Result, StorageContext};
use crate::ids::new_id;
use crate::model::money::sum_money;
use crate::model::{NewProject, Project, ProjectPatch};
use crate::validate;

use super::{Boq, now_us, require_project};

/// Read-time roll-up across every bill of a project. Nothing here is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub bill_count: u32,
    pub section_count: u32,
    pub item_count: u32,
    pub collection_count: u32,
    pub budget: Decimal,
    pub subtotal_amount: Decimal,
    pub contingency_amount: Decimal,
    pub total_amount: Decimal,
    /// `budget - total_amount`; negative when over budget.
    pub budget_remaining: Decimal,
}

pub struct ProjectStore<'a> {
    boq: &'a Boq,
}

impl<'a> ProjectStore<'a> {
    pub(crate) const fn new(boq: &'a Boq) -> Self {
        Self { boq }
    }

    /// # Errors
    ///
    /// Returns [`crate::BoqError::NotFound`] when the project does not exist.
    pub fn get(&self, project_id: &str) -> Result<Project> {
        require_project(self.boq.connection(), project_id)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self) -> Result<Vec<Project>> {
        query::list_projects(self.boq.connection())
    }

    /// # Errors
    ///
    /// Returns [`crate::BoqError::Validation`] for blank name or code or a
    /// negative budget.
    pub fn create(&self, input: NewProject) -> Result<Project> {
        validate::new_project(&input)?;

        let now = now_us();
        let project = Project {
            id: new_id(Entity::Project),
            name: input.name,
            code: input.code,
            budget: input.budget,
            currency: input
                .currency
                .unwrap_or_else(|| self.boq.defaults().currency.clone()),
            created_at_us: now,
            updated_at_us: now,
        };

        self.boq.write("create project", |cx| {
            cx.conn()
                .execute(
                    "INSERT INTO projects (project_id, name, code, budget, currency,
                                           created_at_us, updated_at_us)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        project.id,
                        project.name,
                        project.code,
                        decimal_text(project.budget),
                        project.currency,
                        project.created_at_us,
                        project.updated_at_us,
                    ],
                )
                .with_storage(|| format!("insert project '{}'", project.id))?;
            Ok(())
        })?;

        info!(project_id = %project.id, code = %project.code, "created project");
        Ok(project)
    }

    /// # Errors
    ///
    /// Returns [`crate::BoqError::NotFound`] when the project does not exist.
    pub fn update(&self, project_id: &str, patch: ProjectPatch) -> Result<Project> {
        validate::project_patch(&patch)?;

        let project = self.boq.write("update project", |cx| {
            let conn = cx.conn();
            let mut project = require_project(conn, project_id)?;
            if let Some(name) = patch.name {
                project.name = name;
            }
            if let Some(code) = patch.code {
                project.code = code;
            }
            if let Some(budget) = patch.budget {
                project.budget = budget;
            }
            if let Some(currency) = patch.currency {
                project.currency = currency;
            }
            project.updated_at_us = now_us();

            conn.execute(
                "UPDATE projects SET name = ?2, code = ?3, budget = ?4, currency = ?5,
                     updated_at_us = ?6
                 WHERE project_id = ?1",
                params![
                    project.id,
                    project.name,
                    project.code,
                    decimal_text(project.budget),
                    project.currency,
                    project.updated_at_us,
                ],
            )
            .with_storage(|| format!("update project '{project_id}'"))?;
            Ok(project)
        })?;

        info!(project_id, "updated project");
        Ok(project)
    }

    /// Delete a project and everything it owns.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BoqError::NotFound`] when the project does not exist.
    pub fn remove(&self, project_id: &str) -> Result<()> {
        self.boq.write("remove project", |cx| {
            let conn = cx.conn();
            require_project(conn, project_id)?;
            conn.execute(
                "DELETE FROM projects WHERE project_id = ?1",
                params![project_id],
            )
            .with_storage(|| format!("delete project '{project_id}'"))?;
            Ok(())
        })?;

        info!(project_id, "removed project");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`crate::BoqError::NotFound`] when the project does not exist.
    pub fn stats(&self, project_id: &str) -> Result<ProjectStats> {
        let conn = self.boq.connection();
        let project = require_project(conn, project_id)?;
        let (bill_count, section_count, item_count, collection_count) =
            query::project_counts(conn, project_id)?;

        let bills = query::list_bills(conn, project_id)?;
        let subtotal_amount =
            sum_money("subtotal_amount", bills.iter().map(|bill| bill.subtotal_amount))?;
        let contingency_amount =
            sum_money("contingency_amount", bills.iter().map(|bill| bill.contingency_amount))?;
        let total_amount = sum_money("total_amount", bills.iter().map(|bill| bill.total_amount))?;
        let budget_remaining = project
            .budget
            .checked_sub(total_amount)
            .ok_or_else(|| BoqError::validation("budget_remaining", "amount out of range"))?;

        Ok(ProjectStats {
            bill_count,
            section_count,
            item_count,
            collection_count,
            budget: project.budget,
            subtotal_amount,
            contingency_amount,
            total_amount,
            budget_remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewBill, NewItem, NewSection};

    fn dec(raw: &str) -> Decimal {
        raw.parse().expect("valid decimal literal")
    }

    #[test]
    fn create_uses_default_currency() {
        let boq = Boq::open_in_memory().expect("open");
        let project = boq
            .projects()
            .create(NewProject {
                name: "Staff housing".into(),
                code: "SH".into(),
                budget: dec("500000"),
                currency: None,
            })
            .expect("create");
        assert_eq!(project.currency, "KES");
        assert_eq!(boq.projects().get(&project.id).expect("get"), project);
    }

    #[test]
    fn stats_roll_up_bills() {
        let boq = Boq::open_in_memory().expect("open");
        let project = boq
            .projects()
            .create(NewProject {
                name: "Staff housing".into(),
                code: "SH".into(),
                budget: dec("3000"),
                currency: Some("USD".into()),
            })
            .expect("create");
        let bill = boq
            .bills()
            .create(NewBill {
                project_id: project.id.clone(),
                bill_number: "1".into(),
                bill_title: "Houses".into(),
                contingency_percentage: Some(dec("10")),
                ..NewBill::default()
            })
            .expect("bill");
        let section = boq
            .sections()
            .create(NewSection {
                project_id: project.id.clone(),
                bill_id: Some(bill.id),
                section_code: "A".into(),
                section_title: "Type A".into(),
                ..NewSection::default()
            })
            .expect("section");
        boq.items()
            .create(NewItem {
                project_id: project.id.clone(),
                section_id: Some(section.id),
                description: "Roofing".into(),
                quantity: Some(dec("2")),
                rate: Some(dec("1000")),
                ..NewItem::default()
            })
            .expect("item");

        let stats = boq.projects().stats(&project.id).expect("stats");
        assert_eq!(stats.bill_count, 1);
        assert_eq!(stats.section_count, 1);
        assert_eq!(stats.item_count, 1);
        assert_eq!(stats.collection_count, 0);
        assert_eq!(stats.subtotal_amount, dec("2000"));
        assert_eq!(stats.contingency_amount, dec("200"));
        assert_eq!(stats.total_amount, dec("2200"));
        assert_eq!(stats.budget_remaining, dec("800"));
    }

    #[test]
    fn remove_cascades_everything() {
        let boq = Boq::open_in_memory().expect("open");
        let project = boq
            .projects()
            .create(NewProject {
                name: "Temporary".into(),
                code: "TMP".into(),
                ..NewProject::default()
            })
            .expect("create");
        boq.bills()
            .create(NewBill {
                project_id: project.id.clone(),
                bill_number: "1".into(),
                bill_title: "Only".into(),
                ..NewBill::default()
            })
            .expect("bill");

        boq.projects().remove(&project.id).expect("remove");
        assert!(boq.bills().list(&project.id).expect("list").is_empty());
        assert!(boq.projects().get(&project.id).expect_err("gone").is_not_found());
    }
}
