//! Multi-week navigation over generated calendars.
//!
//! Weeks are generated on demand and kept, so stepping back and forth never
//! regenerates a week that was already shown.

use chrono::NaiveDate;
use rand::Rng;
use tracing::debug;

use crate::calendar::CalendarEngine;
use crate::error::Result;
use crate::model::Calendar;

pub struct PlanSession<'a> {
    engine: CalendarEngine<'a>,
    today: NaiveDate,
    weeks: Vec<Calendar>,
    cursor: usize,
}

impl<'a> PlanSession<'a> {
    pub fn new(engine: CalendarEngine<'a>, today: NaiveDate) -> Self {
        Self {
            engine,
            today,
            weeks: Vec::new(),
            cursor: 0,
        }
    }

    /// Discard any history and generate week 0.
    pub async fn start<R: Rng + Send + ?Sized>(&mut self, rng: &mut R) -> Result<&Calendar> {
        let calendar = self.engine.generate(0, self.today, rng).await?;
        self.weeks.clear();
        self.weeks.push(calendar);
        self.cursor = 0;
        Ok(&self.weeks[0])
    }

    /// Move forward one week, generating it if it has not been seen yet.
    pub async fn next_week<R: Rng + Send + ?Sized>(&mut self, rng: &mut R) -> Result<&Calendar> {
        if self.weeks.is_empty() {
            return self.start(rng).await;
        }
        if self.cursor + 1 == self.weeks.len() {
            let offset = self.weeks.len() as u32;
            let calendar = self.engine.generate(offset, self.today, rng).await?;
            self.weeks.push(calendar);
        }
        self.cursor += 1;
        debug!(cursor = self.cursor, weeks = self.weeks.len(), "next week");
        Ok(&self.weeks[self.cursor])
    }

    /// Step back one week. Stays on week 0 and returns `None` there.
    pub fn prev_week(&mut self) -> Option<&Calendar> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.weeks.get(self.cursor)
    }

    pub fn current(&self) -> Option<&Calendar> {
        self.weeks.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// All weeks generated so far, in order.
    pub fn weeks(&self) -> &[Calendar] {
        &self.weeks
    }
}
