//! In-process HR data used by the shipped handlers in dev and tests.
//!
//! Employees imported from uploaded files feed timekeeping, whose records
//! feed payroll. A date range id is written inline as `YYYY-MM-DD..YYYY-MM-DD`
//! and covers at most [`MAX_RANGE_DAYS`] days.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use payforge_core::{FileId, TenantId};
use payforge_jobs::handlers::{EmployeeDay, EmployeeImporter, PayrollProcessor, TimekeepingProcessor};

use crate::files::InMemoryFileStore;

/// Row key identifying an employee.
pub const EMPLOYEE_NO: &str = "employeeNo";

/// Longest date range, in days, a timekeeping or payroll run may cover.
pub const MAX_RANGE_DAYS: i64 = 366;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payslip {
    pub tenant_id: TenantId,
    pub date_range_id: String,
    pub employee_id: String,
    pub days_worked: usize,
}

#[derive(Debug, Default)]
struct Records {
    employees: HashMap<TenantId, BTreeMap<String, JsonValue>>,
    timekeeping: Vec<(TenantId, String, EmployeeDay)>,
    payslips: Vec<Payslip>,
}

#[derive(Debug)]
pub struct InMemoryWorkforce {
    files: Arc<InMemoryFileStore>,
    records: RwLock<Records>,
}

impl InMemoryWorkforce {
    pub fn new(files: Arc<InMemoryFileStore>) -> Self {
        Self {
            files,
            records: RwLock::new(Records::default()),
        }
    }

    #[cfg(test)]
    pub(crate) fn payslips(&self, tenant_id: TenantId) -> anyhow::Result<Vec<Payslip>> {
        Ok(self
            .read()?
            .payslips
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    fn read(&self) -> anyhow::Result<std::sync::RwLockReadGuard<'_, Records>> {
        self.records.read().map_err(|_| anyhow!("workforce lock poisoned"))
    }

    fn write(&self) -> anyhow::Result<std::sync::RwLockWriteGuard<'_, Records>> {
        self.records.write().map_err(|_| anyhow!("workforce lock poisoned"))
    }
}

fn parse_range(id: &str) -> anyhow::Result<(NaiveDate, NaiveDate)> {
    let (start, end) = id
        .split_once("..")
        .ok_or_else(|| anyhow!("date range {id} is not START..END"))?;
    let start: NaiveDate = start.trim().parse().with_context(|| format!("date range {id}"))?;
    let end: NaiveDate = end.trim().parse().with_context(|| format!("date range {id}"))?;
    if end < start {
        bail!("date range {id} ends before it starts");
    }
    let days = (end - start).num_days() + 1;
    if days > MAX_RANGE_DAYS {
        bail!("date range {id} covers {days} days, at most {MAX_RANGE_DAYS} allowed");
    }
    Ok((start, end))
}

#[async_trait]
impl EmployeeImporter for InMemoryWorkforce {
    async fn read_rows(&self, tenant_id: TenantId, file_id: FileId) -> anyhow::Result<Vec<JsonValue>> {
        let file = self
            .files
            .get(tenant_id, file_id)?
            .ok_or_else(|| anyhow!("file {file_id} not found"))?;
        Ok(file.rows)
    }

    async fn import_row(&self, tenant_id: TenantId, row: &JsonValue) -> anyhow::Result<()> {
        let employee_no = match row.get(EMPLOYEE_NO) {
            Some(JsonValue::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => bail!("missing {EMPLOYEE_NO}"),
        };
        self.write()?
            .employees
            .entry(tenant_id)
            .or_default()
            .insert(employee_no, row.clone());
        Ok(())
    }
}

#[async_trait]
impl TimekeepingProcessor for InMemoryWorkforce {
    async fn employee_days(&self, tenant_id: TenantId, date_range_id: &str) -> anyhow::Result<Vec<EmployeeDay>> {
        let (start, end) = parse_range(date_range_id)?;
        let records = self.read()?;
        let Some(employees) = records.employees.get(&tenant_id) else {
            return Ok(Vec::new());
        };

        Ok(employees
            .keys()
            .flat_map(|employee_id| {
                start.iter_days().take_while(move |d| *d <= end).map(move |date| EmployeeDay {
                    employee_id: employee_id.clone(),
                    date,
                })
            })
            .collect())
    }

    async fn process_day(&self, tenant_id: TenantId, date_range_id: &str, day: &EmployeeDay) -> anyhow::Result<()> {
        let mut records = self.write()?;
        let known = records
            .employees
            .get(&tenant_id)
            .is_some_and(|e| e.contains_key(&day.employee_id));
        if !known {
            bail!("employee {} not found", day.employee_id);
        }
        records.timekeeping.retain(|(t, r, d)| !(*t == tenant_id && r == date_range_id && d == day));
        records
            .timekeeping
            .push((tenant_id, date_range_id.to_string(), day.clone()));
        Ok(())
    }
}

#[async_trait]
impl PayrollProcessor for InMemoryWorkforce {
    async fn employees(&self, tenant_id: TenantId, date_range_id: &str) -> anyhow::Result<Vec<String>> {
        parse_range(date_range_id)?;
        let records = self.read()?;
        let mut employees: Vec<String> = records
            .timekeeping
            .iter()
            .filter(|(t, r, _)| *t == tenant_id && r == date_range_id)
            .map(|(_, _, d)| d.employee_id.clone())
            .collect();
        employees.sort();
        employees.dedup();
        Ok(employees)
    }

    async fn compute_payroll(&self, tenant_id: TenantId, date_range_id: &str, employee_id: &str) -> anyhow::Result<()> {
        let mut records = self.write()?;
        let days_worked = records
            .timekeeping
            .iter()
            .filter(|(t, r, d)| *t == tenant_id && r == date_range_id && d.employee_id == employee_id)
            .count();
        if days_worked == 0 {
            bail!("no timekeeping for {employee_id}");
        }
        records
            .payslips
            .retain(|p| !(p.tenant_id == tenant_id && p.date_range_id == date_range_id && p.employee_id == employee_id));
        records.payslips.push(Payslip {
            tenant_id,
            date_range_id: date_range_id.to_string(),
            employee_id: employee_id.to_string(),
            days_worked,
        });
        Ok(())
    }
}
