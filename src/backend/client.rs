use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::wire::{self, DayResponse};
use super::{
    CoincidenceQuery, ForecastQuery, FrequencyQuery, MultiLotteryQuery, Outcome, PatternQuery,
    ResultsQuery, ScrapingRequest, SearchBackend, StatusSource,
};
use crate::analysis::FrequencyReport;
use crate::config::Config;
use crate::dates::format_local;
use crate::error::{AppError, Result};
use crate::types::{
    AnimalSearch, AutoScrapingStatus, CoincidenceSearch, DatabaseStats, DrawRecord,
    DuplicateReport, ForecastReport, MultiLotterySearch, PatternSearch,
};

/// Sentinels the results listing uses for "no filter".
const ALL_LOTTERIES: &str = "TODAS";
const ALL_SCHEDULES: &str = "TODOS";

type Params = Vec<(&'static str, String)>;

/// reqwest client for the results / pattern-analysis API.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &Params) -> Result<Outcome<T>> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, params = params.len(), "GET");
        let resp = self.client.get(&url).query(params).send().await?;
        Self::read(resp).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<Outcome<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "POST");
        let resp = self.client.post(&url).json(body).send().await?;
        Self::read(resp).await
    }

    /// Non-2xx is a transport failure even when the body carries an `error`
    /// message; only successful bodies can be soft rejections.
    async fn read<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Outcome<T>> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp.bytes().await?;
        wire::decode(&bytes)
    }

    fn range_params(lottery: &str, reference_date: NaiveDate, from: NaiveDate, to: NaiveDate) -> Params {
        vec![
            ("loteria", lottery.to_string()),
            ("fecha_referencia", format_local(reference_date)),
            ("fecha_inicio", format_local(from)),
            ("fecha_fin", format_local(to)),
        ]
    }

    fn pattern_params(q: &PatternQuery) -> Params {
        let mut params = Self::range_params(&q.lottery, q.reference_date, q.from, q.to);
        params.push(("min_similitud", q.min_similarity.to_string()));
        params
    }

    fn forecast_params(q: &ForecastQuery) -> Params {
        let mut params = Self::range_params(&q.lottery, q.reference_date, q.from, q.to);
        if let Some(top_n) = q.top_n {
            params.push(("top_n", top_n.to_string()));
        }
        params
    }

    async fn day(&self, path: &str, lottery: &str, date: NaiveDate) -> Result<Outcome<Vec<DrawRecord>>> {
        let params = vec![("loteria", lottery.to_string()), ("fecha", format_local(date))];
        let outcome: Outcome<DayResponse> = self.get(path, &params).await?;
        Ok(outcome.map(|day| day.into_draws(lottery, date)))
    }

    // -----------------------------------------------------------------------
    // Auxiliary endpoints
    // -----------------------------------------------------------------------

    pub async fn results(&self, q: &ResultsQuery) -> Result<Outcome<Vec<DrawRecord>>> {
        let params = vec![
            ("fecha_inicio", format_local(q.from)),
            ("fecha_fin", format_local(q.to)),
            ("loteria", q.lottery.clone().unwrap_or_else(|| ALL_LOTTERIES.to_string())),
            ("horario", q.schedule.clone().unwrap_or_else(|| ALL_SCHEDULES.to_string())),
        ];
        let outcome: Outcome<wire::ResultsResponse> = self.get("/api/resultados", &params).await?;
        let outcome = outcome.map(Vec::<DrawRecord>::from);
        if let Outcome::Ready(rows) = &outcome {
            info!(count = rows.len(), "fetched results");
        }
        Ok(outcome)
    }

    pub async fn stats(&self) -> Result<Outcome<DatabaseStats>> {
        let outcome: Outcome<wire::StatsResponse> = self.get("/api/estadisticas", &Vec::new()).await?;
        Ok(outcome.map(DatabaseStats::from))
    }

    /// Historical scrape over a date range; returns the number of stored results.
    pub async fn start_scraping(&self, req: &ScrapingRequest) -> Result<Outcome<u64>> {
        let body = serde_json::json!({
            "fecha_inicio": format_local(req.from),
            "fecha_fin": format_local(req.to),
            "loterias": req.lotteries,
        });
        info!(from = %req.from, to = %req.to, lotteries = req.lotteries.len(), "starting scrape");
        let outcome: Outcome<wire::ScrapingResponse> = self.post("/api/scraping", &body).await?;
        Ok(outcome.map(|r| r.total_resultados))
    }

    pub async fn set_auto_scraping(&self, active: bool) -> Result<AutoScrapingStatus> {
        let body = serde_json::json!({ "activo": active });
        let outcome: Outcome<wire::AutoScrapingResponse> = self.post("/api/auto-scraping", &body).await?;
        match outcome {
            Outcome::Ready(resp) => Ok(resp.into()),
            Outcome::Rejected(message) => Err(AppError::Server { status: 200, body: message }),
        }
    }

    pub async fn duplicates(&self) -> Result<Outcome<DuplicateReport>> {
        let outcome: Outcome<wire::DuplicatesResponse> = self.get("/api/db/duplicados", &Vec::new()).await?;
        Ok(outcome.map(DuplicateReport::from))
    }

    /// Returns the number of deleted rows.
    pub async fn remove_duplicates(&self) -> Result<Outcome<u64>> {
        let outcome: Outcome<wire::RemovalResponse> =
            self.post("/api/db/eliminar-duplicados", &serde_json::json!({})).await?;
        if let Outcome::Ready(r) = &outcome {
            info!(removed = r.registros_eliminados, "removed duplicate results");
        }
        Ok(outcome.map(|r| r.registros_eliminados))
    }
}

// ---------------------------------------------------------------------------
// SearchBackend
// ---------------------------------------------------------------------------

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn reference_day(&self, lottery: &str, date: NaiveDate) -> Result<Outcome<Vec<DrawRecord>>> {
        self.day("/api/patrones/referencia", lottery, date).await
    }

    async fn similar_patterns(&self, q: &PatternQuery) -> Result<Outcome<PatternSearch>> {
        let outcome: Outcome<wire::PatternResponse> =
            self.get("/api/patrones/similares", &Self::pattern_params(q)).await?;
        Ok(outcome.map(|r| r.into_search(&q.lottery, q.reference_date, q.from, q.to)))
    }

    async fn pattern_forecasts(&self, q: &ForecastQuery) -> Result<Outcome<ForecastReport>> {
        let outcome: Outcome<wire::ForecastResponse> =
            self.get("/api/patrones/pronosticos", &Self::forecast_params(q)).await?;
        Ok(outcome.map(ForecastReport::from))
    }

    async fn animal_patterns(&self, q: &PatternQuery) -> Result<Outcome<AnimalSearch>> {
        let outcome: Outcome<wire::AnimalPatternResponse> =
            self.get("/api/animales/patrones", &Self::pattern_params(q)).await?;
        Ok(outcome.map(|r| r.into_search(&q.lottery, q.reference_date)))
    }

    async fn animal_forecasts(&self, q: &ForecastQuery) -> Result<Outcome<ForecastReport>> {
        let outcome: Outcome<wire::ForecastResponse> =
            self.get("/api/animales/pronosticos", &Self::forecast_params(q)).await?;
        Ok(outcome.map(ForecastReport::from))
    }

    async fn multi_lottery(&self, q: &MultiLotteryQuery) -> Result<Outcome<MultiLotterySearch>> {
        let mut params = Self::range_params(&q.lottery, q.reference_date, q.from, q.to);
        params.push(("min_similitud", q.min_similarity.to_string()));
        for lottery in &q.comparison_lotteries {
            params.push(("loterias", lottery.clone()));
        }
        let outcome: Outcome<wire::MultiLotteryResponse> = self.get("/api/multiloterias", &params).await?;
        Ok(outcome.map(|r| r.into_search(&q.lottery, q.reference_date)))
    }

    async fn frequencies(&self, q: &FrequencyQuery) -> Result<Outcome<FrequencyReport>> {
        let params = vec![
            ("loteria", q.lottery.clone()),
            ("fecha_inicio", format_local(q.from)),
            ("fecha_fin", format_local(q.to)),
            ("tipo", q.direction.as_param().to_string()),
        ];
        self.get("/api/frecuencias", &params).await
    }

    async fn multi_forecasts(&self, q: &ForecastQuery) -> Result<Outcome<ForecastReport>> {
        let params = Self::range_params(&q.lottery, q.reference_date, q.from, q.to);
        let outcome: Outcome<wire::ForecastResponse> = self.get("/api/multipronosticos", &params).await?;
        Ok(outcome.map(ForecastReport::from))
    }

    async fn coincidences(&self, q: &CoincidenceQuery) -> Result<Outcome<CoincidenceSearch>> {
        let params = vec![
            ("loteria", q.lottery.clone()),
            ("animal1", q.first_animal.clone()),
            ("animal2", q.second_animal.clone()),
            ("fecha_inicio", format_local(q.from)),
            ("fecha_fin", format_local(q.to)),
        ];
        let outcome: Outcome<wire::CoincidenceResponse> = self.get("/api/coincidencias", &params).await?;
        Ok(outcome.map(|r| r.into_search(&q.lottery, &q.first_animal, &q.second_animal)))
    }

    async fn coincidence_day(&self, lottery: &str, date: NaiveDate) -> Result<Outcome<Vec<DrawRecord>>> {
        self.day("/api/coincidencias/dia", lottery, date).await
    }
}

#[async_trait]
impl StatusSource for HttpBackend {
    async fn auto_scraping_status(&self) -> Result<AutoScrapingStatus> {
        let outcome: Outcome<wire::AutoScrapingResponse> =
            self.get("/api/auto-scraping/status", &Vec::new()).await?;
        match outcome {
            Outcome::Ready(resp) => Ok(resp.into()),
            Outcome::Rejected(message) => Err(AppError::Server { status: 200, body: message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn range_params_use_local_dates() {
        let params = HttpBackend::range_params("LOTTO ACTIVO", ymd(2024, 3, 7), ymd(2024, 1, 1), ymd(2024, 3, 6));
        assert_eq!(params[0], ("loteria", "LOTTO ACTIVO".to_string()));
        assert_eq!(params[1], ("fecha_referencia", "07/03/2024".to_string()));
        assert_eq!(params[2], ("fecha_inicio", "01/01/2024".to_string()));
        assert_eq!(params[3], ("fecha_fin", "06/03/2024".to_string()));
    }

    #[test]
    fn top_n_only_sent_when_set() {
        let mut q = ForecastQuery {
            lottery: "LOTTO REY".to_string(),
            reference_date: ymd(2024, 3, 7),
            from: ymd(2024, 1, 1),
            to: ymd(2024, 3, 6),
            top_n: None,
        };
        assert!(!HttpBackend::forecast_params(&q).iter().any(|(k, _)| *k == "top_n"));
        q.top_n = Some(5);
        assert!(HttpBackend::forecast_params(&q).contains(&("top_n", "5".to_string())));
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let cfg = Config {
            api_url: "http://localhost:5000/".to_string(),
            log_level: "info".to_string(),
            http_timeout_secs: 5,
            status_poll_interval_secs: 30,
            default_lottery: "LOTTO ACTIVO".to_string(),
            min_similarity: 30,
        };
        let backend = HttpBackend::new(&cfg).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:5000");
    }
}
