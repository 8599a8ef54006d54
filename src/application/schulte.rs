use chrono::{DateTime, Utc};
use rand::Rng;

pub const SCHULTE_GRID_SIZE: u8 = 5;
pub const SCHULTE_CELL_COUNT: u8 = SCHULTE_GRID_SIZE * SCHULTE_GRID_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchulteStatus {
    Idle,
    Playing,
    Finished,
}

impl SchulteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchulteStatus::Idle => "idle",
            SchulteStatus::Playing => "playing",
            SchulteStatus::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchulteClick {
    Ignored,
    Advanced { next_number: u8 },
    Finished { time_taken: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchulteRound {
    grid: Vec<u8>,
    next_number: u8,
    status: SchulteStatus,
    started_at: Option<DateTime<Utc>>,
    final_elapsed: f64,
}

impl SchulteRound {
    pub fn new() -> Self {
        Self {
            grid: shuffled_grid(),
            next_number: 1,
            status: SchulteStatus::Idle,
            started_at: None,
            final_elapsed: 0.0,
        }
    }

    pub fn grid(&self) -> &[u8] {
        &self.grid
    }

    pub fn next_number(&self) -> u8 {
        self.next_number
    }

    pub fn status(&self) -> SchulteStatus {
        self.status
    }

    pub fn click(&mut self, number: u8, now: DateTime<Utc>) -> SchulteClick {
        if self.status == SchulteStatus::Finished || number != self.next_number {
            return SchulteClick::Ignored;
        }

        if number == 1 {
            self.status = SchulteStatus::Playing;
            self.started_at = Some(now);
        }

        if number == SCHULTE_CELL_COUNT {
            self.status = SchulteStatus::Finished;
            self.final_elapsed = round_two_decimals(self.raw_elapsed(now));
            return SchulteClick::Finished {
                time_taken: self.final_elapsed,
            };
        }

        self.next_number += 1;
        SchulteClick::Advanced {
            next_number: self.next_number,
        }
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        match self.status {
            SchulteStatus::Idle => 0.0,
            SchulteStatus::Playing => self.raw_elapsed(now),
            SchulteStatus::Finished => self.final_elapsed,
        }
    }

    fn raw_elapsed(&self, now: DateTime<Utc>) -> f64 {
        match self.started_at {
            Some(started_at) => (now - started_at).num_milliseconds().max(0) as f64 / 1000.0,
            None => 0.0,
        }
    }
}

impl Default for SchulteRound {
    fn default() -> Self {
        Self::new()
    }
}

fn shuffled_grid() -> Vec<u8> {
    let mut numbers: Vec<u8> = (1..=SCHULTE_CELL_COUNT).collect();
    let mut rng = rand::rng();
    for index in (1..numbers.len()).rev() {
        let swap_with = rng.random_range(0..=index);
        numbers.swap(index, swap_with);
    }
    numbers
}

fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
