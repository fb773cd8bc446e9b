//! The display side: what a station shows, and in which order.

use anyhow::Result;

use crate::{model::{Conditions, Forecast}, stats::Statistics};

/// A display the station draws its screens on. Renderers only read the records.
pub trait Renderer {
    fn render_conditions(&mut self, conditions: &Conditions) -> Result<()>;

    fn render_astronomy(&mut self, conditions: &Conditions) -> Result<()>;

    fn render_forecast(&mut self, forecast: &Forecast) -> Result<()>;

    fn render_about(&mut self, stats: &Statistics) -> Result<()>;
}

/// One page of the display cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Conditions,
    Astronomy,
    /// Forecast for the day at this slot index.
    Forecast(usize),
    About,
}

impl Screen {
    /// The screen after this one. Empty forecast slots are skipped.
    pub fn next(self, forecasts: &[Forecast]) -> Screen {
        let first_forecast_from = |start: usize| {
            forecasts
                .iter()
                .enumerate()
                .skip(start)
                .find(|(_, f)| !f.is_empty())
                .map(|(i, _)| Screen::Forecast(i))
                .unwrap_or(Screen::About)
        };

        match self {
            Screen::Conditions => Screen::Astronomy,
            Screen::Astronomy => first_forecast_from(0),
            Screen::Forecast(i) => first_forecast_from(i + 1),
            Screen::About => Screen::Conditions,
        }
    }

    /// Draw this screen from the current records.
    pub fn show<R: Renderer + ?Sized>(
        self,
        renderer: &mut R,
        conditions: &Conditions,
        forecasts: &[Forecast],
        stats: &Statistics,
    ) -> Result<()> {
        match self {
            Screen::Conditions => renderer.render_conditions(conditions),
            Screen::Astronomy => renderer.render_astronomy(conditions),
            Screen::Forecast(i) => match forecasts.get(i) {
                Some(forecast) => renderer.render_forecast(forecast),
                None => renderer.render_about(stats),
            },
            Screen::About => renderer.render_about(stats),
        }
    }
}
