use grab12306::query_flow::{TicketRow, build_client, fetch_rows};
use mockito::Matcher;

fn sample_raw(train_no: &str, second_class: &str) -> String {
    let mut fields: Vec<String> = (0..37).map(|_| String::new()).collect();
    fields[3] = train_no.to_string();
    fields[8] = "08:00".to_string();
    fields[9] = "12:30".to_string();
    fields[10] = "04:30".to_string();
    fields[29] = "有".to_string();
    fields[30] = second_class.to_string();
    fields.join("|")
}

#[tokio::test]
async fn fetch_rows_parses_query_response() {
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "httpstatus": 200,
        "data": {
            "result": [sample_raw("G101", "有"), sample_raw("K528", "*")],
            "flag": "1",
        },
        "status": true,
    });
    let mock = server
        .mock("GET", Matcher::Regex("^/otn/leftTicket/queryO".to_string()))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("leftTicketDTO.train_date".into(), "2024-10-11".into()),
            Matcher::UrlEncoded("leftTicketDTO.from_station".into(), "UOQ".into()),
            Matcher::UrlEncoded("leftTicketDTO.to_station".into(), "LHA".into()),
            Matcher::UrlEncoded("purpose_codes".into(), "ADULT".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let client = build_client().unwrap();
    let base_url = format!("{}/otn/leftTicket/queryO", server.url());
    let rows = fetch_rows(&client, &base_url, "2024-10-11", "UOQ", "LHA")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].train_no, "G101");
    assert_eq!(rows[0].start_time, "08:00");
    assert_eq!(rows[0].arrive_time, "12:30");
    assert_eq!(rows[0].duration, "04:30");
    assert!(!rows[0].presale_pending());
    assert_eq!(rows[1].train_no, "K528");
    assert!(rows[1].presale_pending());
}

#[tokio::test]
async fn fetch_rows_returns_empty_for_empty_result() {
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "httpstatus": 200,
        "data": { "result": [], "flag": "0" },
        "status": true,
    });
    server
        .mock("GET", Matcher::Regex("^/otn/leftTicket/queryO".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let client = build_client().unwrap();
    let base_url = format!("{}/otn/leftTicket/queryO", server.url());
    let rows: Vec<TicketRow> = fetch_rows(&client, &base_url, "2024-10-11", "UOQ", "LHA")
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn fetch_rows_fails_on_malformed_row() {
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "httpstatus": 200,
        "data": { "result": ["only|three|fields"], "flag": "1" },
        "status": true,
    });
    server
        .mock("GET", Matcher::Regex("^/otn/leftTicket/queryO".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let client = build_client().unwrap();
    let base_url = format!("{}/otn/leftTicket/queryO", server.url());
    let result = fetch_rows(&client, &base_url, "2024-10-11", "UOQ", "LHA").await;
    assert!(result.is_err());
}
