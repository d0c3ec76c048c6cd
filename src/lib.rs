pub mod cli;
pub mod config;
pub mod schema;

use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use reqwest::header::{HeaderMap, HeaderValue};

use crate::cli::Args;
use crate::config::Config;
use crate::schema::StationMap;

static QUERY_URL: &str = "https://kyfw.12306.cn/otn/leftTicket/queryO";
static BOOKING_PAGE_URL: &str = "https://kyfw.12306.cn/otn/leftTicket/init";

// Session artifact captured from a logged-in browser. The query endpoint
// rejects cookie-less requests even though the session itself is long dead.
static COOKIE: &str = "_uab_collina=171959196059070525462211; JSESSIONID=934CC95F7C881851D560D6EF8B7B67B5; tk=OYBnZPnapPHALsWNqLyIlFgK3ADcfICc3mdXI8QJZ-slmB1B0; _jc_save_wfdc_flag=dc; guidesStatus=off; highContrastMode=defaltMode; cursorStatus=off; _jc_save_toDate=2024-10-10; route=6f50b51faa11b987e576cdb301e545c4; BIGipServerotn=1943601418.64545.0000; _jc_save_fromStation=%u5A04%u5E95%u5357%2CUOQ; _jc_save_toStation=%u9686%u56DE%2CLHA; BIGipServerpassport=954728714.50215.0000; _jc_save_fromDate=2024-10-11; uKey=3a678c0f4997b5f9ce2423e0bc56c25fdf1b511105ed9aa129a89ddddb3f230d";

fn get_header() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Cookie", HeaderValue::from_static(COOKIE));
    headers.insert(
        "User-Agent",
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36 Edg/129.0.0.0",
        ),
    );
    headers
}

fn get_required_input(hint: &str) -> String {
    loop {
        println!("{hint}");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input).unwrap_or_default();
        let input = input.trim();
        if !input.is_empty() {
            return input.to_string();
        }
    }
}

pub async fn run(args: Args) -> Result<()> {
    let config = Config::load(&args.config)?;
    let stations = StationMap::load(&args.cities)?;

    let date = match args.date.clone() {
        Some(date) => date,
        None => get_required_input("请输入出发日期（YYYY-MM-DD）："),
    };
    let from_city = match args.from.clone() {
        Some(city) => city,
        None => get_required_input("请输入出发城市："),
    };
    let to_city = match args.to.clone() {
        Some(city) => city,
        None => get_required_input("请输入到达城市："),
    };

    let from_code = stations
        .code(&from_city)
        .with_context(|| format!("城市表中没有出发城市「{from_city}」"))?
        .to_string();
    let to_code = stations
        .code(&to_city)
        .with_context(|| format!("城市表中没有到达城市「{to_city}」"))?
        .to_string();

    // Query phase
    let client = query_flow::build_client()?;
    let rows = query_flow::fetch_rows(&client, QUERY_URL, &date, &from_code, &to_code).await?;
    if query_flow::report_empty(&rows) {
        return Ok(());
    }
    query_flow::show_table(&rows);

    let choice = match args.train {
        Some(index) => index.to_string(),
        None => get_required_input("请选择你想购买的车次序号："),
    };
    let (index, selected) = query_flow::pick_row(&rows, &choice)?;
    info!(
        "已选择第 {} 行: {} {}~{}",
        index, selected.train_no, selected.start_time, selected.arrive_time
    );

    // Browser phase
    let driver = browser::connect(&args).await?;
    let outcome = async {
        login_flow::run_flow(&driver, &config).await?;
        grab_flow::run_flow(&driver, &config, &selected, index, &date, &from_city, &to_city).await
    }
    .await;

    if let Err(err) = driver.quit().await {
        warn!("关闭浏览器会话失败: {err}");
    }
    outcome
}

// Query phase: left-ticket API, pipe-row parsing, console table
pub mod query_flow {
    use super::*;

    use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
    use log::debug;
    use reqwest::Client;
    use serde::Deserialize;
    use thiserror::Error;

    use crate::schema::{PRESALE_MARKER, offsets};

    #[derive(Debug, Error, PartialEq, Eq)]
    pub enum RowError {
        #[error("车次数据字段不足: 需要至少 {expected} 个字段, 实际 {actual} 个")]
        TooShort { expected: usize, actual: usize },
    }

    #[derive(Debug, Deserialize)]
    struct QueryResponse {
        data: Option<QueryData>,
    }

    #[derive(Debug, Deserialize)]
    struct QueryData {
        #[serde(default)]
        result: Vec<String>,
    }

    /// One train from the query response, extracted from the raw
    /// pipe-delimited row by the offsets documented in `schema::offsets`.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct TicketRow {
        pub train_no: String,
        pub start_time: String,
        pub arrive_time: String,
        pub duration: String,
        pub second_class: String,
        pub first_class: String,
        pub business: String,
        pub no_seat: String,
        pub hard_seat: String,
        pub hard_sleeper: String,
        pub soft_sleeper: String,
    }

    impl TicketRow {
        pub fn parse(raw: &str) -> Result<Self, RowError> {
            let fields: Vec<&str> = raw.split('|').collect();
            if fields.len() < offsets::MIN_FIELDS {
                return Err(RowError::TooShort {
                    expected: offsets::MIN_FIELDS,
                    actual: fields.len(),
                });
            }

            Ok(TicketRow {
                train_no: fields[offsets::TRAIN_NO].to_string(),
                start_time: fields[offsets::START_TIME].to_string(),
                arrive_time: fields[offsets::ARRIVE_TIME].to_string(),
                duration: fields[offsets::DURATION].to_string(),
                second_class: fields[offsets::SECOND_CLASS].to_string(),
                first_class: fields[offsets::FIRST_CLASS].to_string(),
                business: fields[offsets::BUSINESS].to_string(),
                no_seat: fields[offsets::NO_SEAT].to_string(),
                hard_seat: fields[offsets::HARD_SEAT].to_string(),
                hard_sleeper: fields[offsets::HARD_SLEEPER].to_string(),
                soft_sleeper: fields[offsets::SOFT_SLEEPER].to_string(),
            })
        }

        /// The classes the grab loop watches still carry the not-on-sale
        /// marker, so the purchase button cannot appear yet.
        pub fn presale_pending(&self) -> bool {
            self.second_class == PRESALE_MARKER || self.hard_seat == PRESALE_MARKER
        }
    }

    pub fn build_client() -> Result<Client> {
        let client = Client::builder()
            .default_headers(get_header())
            .timeout(Duration::from_secs(60))
            .build()
            .context("构建 HTTP 客户端失败")?;
        Ok(client)
    }

    /// Query leftover tickets for one date/origin/destination. `base_url`
    /// is a parameter so tests can point it at a local server.
    pub async fn fetch_rows(
        client: &Client,
        base_url: &str,
        date: &str,
        from_code: &str,
        to_code: &str,
    ) -> Result<Vec<TicketRow>> {
        let url = format!(
            "{base_url}?leftTicketDTO.train_date={date}&leftTicketDTO.from_station={from_code}&leftTicketDTO.to_station={to_code}&purpose_codes=ADULT"
        );
        debug!("查询余票: {url}");

        let response = client
            .get(&url)
            .send()
            .await
            .context("余票查询请求失败")?
            .error_for_status()
            .context("余票查询返回了错误状态码")?;
        let body: QueryResponse = response.json().await.context("余票查询响应不是预期的 JSON")?;

        let raw_rows = body.data.map(|data| data.result).unwrap_or_default();
        raw_rows
            .iter()
            .map(|raw| Ok(TicketRow::parse(raw)?))
            .collect()
    }

    pub static EMPTY_RESULT_MESSAGE: &str = "暂无该方案车次，程序自动退出";

    /// Empty-result exit: print the message and tell the caller to stop
    /// before any selection prompt happens.
    pub fn report_empty(rows: &[TicketRow]) -> bool {
        if rows.is_empty() {
            println!("{EMPTY_RESULT_MESSAGE}");
            return true;
        }
        false
    }

    /// Resolve the user's 1-based row choice. Anything that does not parse
    /// to an in-range index is an error, never a fallback row.
    pub fn pick_row(rows: &[TicketRow], choice: &str) -> Result<(usize, TicketRow)> {
        let choice = choice.trim();
        let index: usize = choice
            .parse()
            .ok()
            .filter(|index| *index >= 1)
            .with_context(|| format!("无效的车次序号「{choice}」"))?;
        let row = rows
            .get(index - 1)
            .with_context(|| format!("车次序号 {index} 超出范围 (1~{})", rows.len()))?;
        Ok((index, row.clone()))
    }

    pub fn show_table(rows: &[TicketRow]) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            "序号", "车次", "出发时间", "到达时间", "耗时", "二等座", "一等座", "商务座", "无座",
            "硬座", "硬卧", "软卧",
        ]);

        for (i, row) in rows.iter().enumerate() {
            table.add_row(vec![
                (i + 1).to_string(),
                row.train_no.clone(),
                row.start_time.clone(),
                row.arrive_time.clone(),
                row.duration.clone(),
                row.second_class.clone(),
                row.first_class.clone(),
                row.business.clone(),
                row.no_seat.clone(),
                row.hard_seat.clone(),
                row.hard_sleeper.clone(),
                row.soft_sleeper.clone(),
            ]);
        }
        println!("{table}");
    }

}

// Browser session setup
pub mod browser {
    use super::*;

    use thirtyfour::WebDriver;
    use thirtyfour::common::capabilities::chromium::ChromiumLikeCapabilities;
    use thirtyfour::prelude::*;

    pub async fn connect(args: &Args) -> Result<WebDriver> {
        let mut caps = DesiredCapabilities::chrome();
        caps.add_arg("--disable-gpu")?;
        caps.add_arg("--no-first-run")?;
        caps.add_arg("--no-default-browser-check")?;
        if args.headless {
            caps.add_arg("--headless=new")?;
        }
        if let Some(address) = &args.attach {
            // Reuse a browser already running with --remote-debugging-port
            caps.add_experimental_option("debuggerAddress", serde_json::json!(address))?;
        }

        let driver = WebDriver::new(&args.webdriver, caps)
            .await
            .with_context(|| format!("连接 chromedriver 失败: {}", args.webdriver))?;
        Ok(driver)
    }
}

// Login phase: conditional credential entry plus the SMS-code retry loop
pub mod login_flow {
    use super::*;

    use thirtyfour::{By, WebDriver};

    static LOGIN_LINK_TEXT: &str = "登录";
    static LOGIN_ERROR_XPATH: &str = r#"//*[@id="message"]/p"#;

    pub async fn run_flow(driver: &WebDriver, config: &Config) -> Result<()> {
        driver
            .goto(BOOKING_PAGE_URL)
            .await
            .context("打开余票查询页面失败")?;

        let login_user = driver
            .find(By::Css("#login_user"))
            .await
            .context("找不到登录入口")?;
        if login_user.text().await?.trim() != LOGIN_LINK_TEXT {
            info!("浏览器已登录，跳过登录流程");
            return Ok(());
        }

        login_user.click().await?;
        driver
            .find(By::Css("#J-userName"))
            .await?
            .send_keys(&config.username)
            .await?;
        driver
            .find(By::Css("#J-password"))
            .await?
            .send_keys(&config.password)
            .await?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        driver.find(By::Css("#J-login")).await?.click().await?;

        driver
            .find(By::Css("#id_card"))
            .await
            .context("找不到证件号输入框")?
            .send_keys(&config.id_card)
            .await?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        driver
            .find(By::Css("#verification_code"))
            .await?
            .click()
            .await?;

        let mut code = get_required_input("请输入手机收到的验证码：");
        loop {
            let code_input = driver.find(By::Css("#code")).await?;
            code_input.clear().await?;
            code_input.send_keys(&code).await?;
            tokio::time::sleep(Duration::from_millis(500)).await;
            driver.find(By::Css("#sureClick")).await?.click().await?;
            tokio::time::sleep(Duration::from_millis(500)).await;

            // find_all so a dead session propagates instead of reading as
            // "no error message shown"
            if driver.find_all(By::XPath(LOGIN_ERROR_XPATH)).await?.is_empty() {
                break;
            }
            code = get_required_input("验证码输入错误！请重新输入验证码：");
        }

        info!("登录完成");
        Ok(())
    }
}

// Grab phase: fill the booking page, then poll until a purchase succeeds
pub mod grab_flow {
    use super::*;

    use std::time::Instant;

    use chrono::Local;
    use log::debug;
    use thirtyfour::{By, Key, WebDriver};

    use crate::query_flow::TicketRow;
    use crate::schema::romanize;

    static STUDENT_DIALOG_XPATH: &str = r#"//*[@id="dialog_xsertcj"]/div[2]"#;
    /// Daily sale-opening time; the page is force-refreshed once the local
    /// clock reads this.
    static OPENING_TIME: &str = "17:30";

    #[allow(clippy::too_many_arguments)]
    pub async fn run_flow(
        driver: &WebDriver,
        config: &Config,
        selected: &TicketRow,
        index: usize,
        date: &str,
        from_city: &str,
        to_city: &str,
    ) -> Result<()> {
        driver
            .goto(BOOKING_PAGE_URL)
            .await
            .context("打开余票查询页面失败")?;

        fill_station(driver, "#fromStationText", from_city).await?;
        fill_station(driver, "#toStationText", to_city).await?;

        let date_input = driver
            .find(By::Css("#train_date"))
            .await
            .context("找不到日期输入框")?;
        date_input.clear().await?;
        date_input.send_keys(date).await?;

        println!("正在抢票中...");
        driver.find(By::Css("#query_ticket")).await?.click().await?;

        // Result rows interleave with detail rows, hence the odd indices.
        let row_selector = format!("#queryLeftTable tr:nth-child({}) .btn72", 2 * index - 1);
        let heart = Duration::from_secs(config.heart);
        let mut last_refresh = Instant::now();

        loop {
            let button_absent = driver.find_all(By::Css(&row_selector)).await?.is_empty();
            if button_absent && selected.presale_pending() {
                if last_refresh.elapsed() >= heart {
                    driver.refresh().await?;
                    println!(
                        "车票还未开售，等待开售...(等待{}秒自动刷新，请勿关闭脚本)",
                        config.heart
                    );
                    tokio::time::sleep(Duration::from_millis(800)).await;
                    driver.find(By::Css("#query_ticket")).await?.click().await?;
                    last_refresh = Instant::now();
                } else if Local::now().format("%H:%M").to_string() == OPENING_TIME {
                    driver.refresh().await?;
                    tokio::time::sleep(Duration::from_millis(800)).await;
                    driver.find(By::Css("#query_ticket")).await?.click().await?;
                }
                continue;
            }

            driver
                .find(By::Css(&row_selector))
                .await
                .with_context(|| format!("车次 {} 的预订按钮不可用", selected.train_no))?
                .click()
                .await?;
            tokio::time::sleep(Duration::from_secs(1)).await;

            driver
                .find(By::Css("#normalPassenger_0"))
                .await
                .context("找不到乘车人选项")?
                .click()
                .await?;

            if !driver
                .find_all(By::XPath(STUDENT_DIALOG_XPATH))
                .await?
                .is_empty()
            {
                let button = if config.is_student() {
                    "#dialog_xsertcj_ok"
                } else {
                    "#dialog_xsertcj_cancel"
                };
                driver.find(By::Css(button)).await?.click().await?;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;

            driver
                .find(By::Css("#submitOrder_id"))
                .await
                .context("找不到提交订单按钮")?
                .click()
                .await?;
            driver
                .find(By::Css("#qr_submit_id"))
                .await
                .context("找不到核对订单确认按钮")?
                .click()
                .await?;

            info!("订单已提交: {} {}", selected.train_no, date);
            break;
        }
        Ok(())
    }

    async fn fill_station(driver: &WebDriver, selector: &str, city: &str) -> Result<()> {
        let romanized = romanize(city);
        debug!("{selector} <- {romanized}");

        let input = driver
            .find(By::Css(selector))
            .await
            .with_context(|| format!("找不到车站输入框 {selector}"))?;
        input.click().await?;
        input.send_keys(&romanized).await?;
        input.send_keys(Key::Enter + "").await?;
        Ok(())
    }
}
