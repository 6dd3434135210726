// Quick diagnostic: test ERPNext credentials and the lead lookup the webhook performs
// Run: cargo run --bin erp_check -- [phone]

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let erp_url = std::env::var("ERP_URL").expect("ERP_URL");
    let erp_url = erp_url.trim_end_matches('/');
    let api_key = std::env::var("ERP_API_KEY").expect("ERP_API_KEY");
    let api_secret = std::env::var("ERP_API_SECRET").expect("ERP_API_SECRET");
    let phone = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "5730000001".to_string());

    let client = reqwest::Client::new();
    let auth = format!("token {}:{}", api_key, api_secret);

    // 1. Who are we?
    println!("1. Checking credentials (GET /api/method/frappe.auth.get_logged_user)...");
    let me_resp = client
        .get(format!("{}/api/method/frappe.auth.get_logged_user", erp_url))
        .header("Authorization", &auth)
        .header("Accept", "application/json")
        .send()
        .await
        .expect("logged user request failed");

    let me_status = me_resp.status();
    let me_body = me_resp.text().await.unwrap_or_default();

    if !me_status.is_success() {
        println!("   FAIL: {} - {}", me_status, me_body);
        return;
    }
    let me_json: serde_json::Value = serde_json::from_str(&me_body).unwrap_or_default();
    println!("   OK. User: {}", me_json["message"].as_str().unwrap_or("?"));

    // 2. Same lookup the webhook issues before deciding lead vs communication
    println!("\n2. Looking up Lead with mobile_no = {}...", phone);
    let filters = serde_json::json!([["Lead", "mobile_no", "=", phone]]).to_string();
    let lookup_resp = client
        .get(format!(
            "{}/api/resource/Lead?fields={}&filters={}",
            erp_url,
            urlencoding::encode(r#"["name","lead_name"]"#),
            urlencoding::encode(&filters)
        ))
        .header("Authorization", &auth)
        .header("Accept", "application/json")
        .send()
        .await
        .expect("lead lookup failed");

    let lookup_status = lookup_resp.status();
    let lookup_body = lookup_resp.text().await.unwrap_or_default();

    println!("   Status: {}", lookup_status);
    println!("   Body: {}", lookup_body);

    let leads: serde_json::Value = serde_json::from_str(&lookup_body).unwrap_or_default();
    match leads["data"].as_array().and_then(|d| d.first()) {
        Some(lead) => println!(
            "\n   FOUND - new messages will be appended to {}",
            lead["name"].as_str().unwrap_or("?")
        ),
        None => println!("\n   NOT FOUND - the next message from {} creates a Lead", phone),
    }
}
