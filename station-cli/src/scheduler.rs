//! The station loop: refresh on timers, cycle screens, stop on request.

use std::future::Future;

use anyhow::Result;
use station_core::{
    Conditions, Forecast, Renderer, ScheduleConfig, Screen, Statistics, WeatherProvider, http::Connector,
};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

/// Everything the display shows, plus the provider that keeps it current.
pub struct Station<C, R> {
    provider: WeatherProvider<C>,
    renderer: R,
    conditions: Conditions,
    forecasts: Vec<Forecast>,
    stats: Statistics,
    screen: Screen,
}

impl<C: Connector, R: Renderer> Station<C, R> {
    pub fn new(provider: WeatherProvider<C>, renderer: R, forecast_days: usize) -> Self {
        Self {
            provider,
            renderer,
            conditions: Conditions::default(),
            forecasts: vec![Forecast::default(); forecast_days],
            stats: Statistics::default(),
            screen: Screen::default(),
        }
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub async fn start(&mut self) {
        self.provider.begin(&mut self.conditions).await;
    }

    /// `false` only when the fetch failed; stale data is not a failure.
    pub async fn refresh_conditions(&mut self) -> bool {
        let before = self.stats.failures();
        self.provider.fetch_conditions(&mut self.conditions, &mut self.stats).await;
        self.stats.failures() == before
    }

    pub async fn refresh_forecasts(&mut self) -> bool {
        self.provider.fetch_forecasts(&mut self.forecasts, &mut self.stats).await
    }

    /// Draw the current screen and move on to the next one.
    pub fn show_next(&mut self) -> Result<()> {
        self.screen.show(&mut self.renderer, &self.conditions, &self.forecasts, &self.stats)?;
        self.screen = self.screen.next(&self.forecasts);
        Ok(())
    }

    /// Draw every screen once, from conditions through the status page.
    pub fn show_all(&mut self) -> Result<()> {
        self.screen = Screen::Conditions;
        loop {
            let last = self.screen == Screen::About;
            self.show_next()?;
            if last {
                return Ok(());
            }
        }
    }

    /// Run until `shutdown` completes. A failed fetch is retried after
    /// `schedule.retry_interval()` instead of waiting for the full period.
    pub async fn run(&mut self, schedule: &ScheduleConfig, shutdown: impl Future<Output = ()>) -> Result<()> {
        self.start().await;

        let mut conditions_timer = interval(schedule.conditions_interval());
        let mut forecasts_timer = interval(schedule.forecasts_interval());
        let mut screen_timer = interval(schedule.screen_interval());
        for timer in [&mut conditions_timer, &mut forecasts_timer, &mut screen_timer] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down");
                    return Ok(());
                }
                _ = conditions_timer.tick() => {
                    if !self.refresh_conditions().await {
                        debug!("retrying conditions in {:?}", schedule.retry_interval());
                        conditions_timer.reset_after(schedule.retry_interval());
                    }
                }
                _ = forecasts_timer.tick() => {
                    if !self.refresh_forecasts().await {
                        debug!("retrying forecasts in {:?}", schedule.retry_interval());
                        forecasts_timer.reset_after(schedule.retry_interval());
                    }
                }
                _ = screen_timer.tick() => self.show_next()?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{io, time::Duration};

    use async_trait::async_trait;
    use station_core::{
        ProviderId, Settings, Units,
        memory::FixedHeap,
        provider::{Location, backend_for},
    };
    use tokio::io::DuplexStream;

    use super::*;

    /// Every connection attempt is refused.
    #[derive(Debug, Default)]
    struct Offline;

    #[async_trait]
    impl Connector for Offline {
        type Stream = DuplexStream;

        async fn connect(&self, _host: &str, _port: u16) -> io::Result<DuplexStream> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "offline"))
        }
    }

    #[derive(Default)]
    struct Screens(Vec<&'static str>);

    impl Renderer for Screens {
        fn render_conditions(&mut self, _: &Conditions) -> Result<()> {
            self.0.push("conditions");
            Ok(())
        }

        fn render_astronomy(&mut self, _: &Conditions) -> Result<()> {
            self.0.push("astronomy");
            Ok(())
        }

        fn render_forecast(&mut self, _: &Forecast) -> Result<()> {
            self.0.push("forecast");
            Ok(())
        }

        fn render_about(&mut self, _: &Statistics) -> Result<()> {
            self.0.push("about");
            Ok(())
        }
    }

    fn station() -> Station<Offline, Screens> {
        let settings = Settings {
            units: Units::Metric,
            api_key: "KEY".into(),
            location: Location { latitude: 53.35, longitude: -6.26, query: "Dublin,IE".into(), nearest: false },
            tz: Box::new(chrono::Utc),
        };
        let provider = WeatherProvider::with_connector(backend_for(ProviderId::OpenWeatherMap), settings, Offline)
            .with_heap_probe(FixedHeap(1 << 20));
        Station::new(provider, Screens::default(), 3)
    }

    #[test]
    fn show_all_draws_each_screen_once() {
        let mut station = station();
        station.show_all().unwrap();
        assert_eq!(station.renderer().0, vec!["conditions", "astronomy", "about"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetches_retry_on_the_short_interval() {
        let mut station = station();
        let schedule = ScheduleConfig {
            conditions_interval_secs: 600,
            forecasts_interval_secs: 3600,
            retry_interval_secs: 60,
            screen_secs: 15,
            forecast_days: 3,
        };

        station.run(&schedule, tokio::time::sleep(Duration::from_secs(130))).await.unwrap();

        // Attempts at 0s, 60s and 120s for each kind.
        assert_eq!(station.stats().connect_failures, 6);
        // Screens at 0s, 15s, ... 120s.
        assert_eq!(station.renderer().0.len(), 9);
        assert_eq!(&station.renderer().0[..4], ["conditions", "astronomy", "about", "conditions"]);
    }
}
