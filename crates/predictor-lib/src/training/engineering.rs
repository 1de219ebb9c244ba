//! Derived housing features and the fixed model feature set

use super::dataset::Dataset;
use anyhow::Result;

/// Column holding the sale price
pub const TARGET_COLUMN: &str = "SalePrice";

/// Model inputs, in the column order the scaler and regressor are fitted on
pub const FEATURE_COLUMNS: [&str; 15] = [
    "Overall Qual",
    "Gr Liv Area",
    "Total Bsmt SF",
    "1st Flr SF",
    "Full Bath",
    "Year Built",
    "Year Remod/Add",
    "Garage Cars",
    "Garage Area",
    "Total SF",
    "House Age",
    "Years Since Remodel",
    "Total Bathrooms",
    "Has Garage",
    "Has Basement",
];

fn indicator(values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| if v > 0.0 { 1.0 } else { 0.0 }).collect()
}

/// Add `Total SF`, `House Age`, `Years Since Remodel`, `Total Bathrooms`,
/// `Has Garage` and `Has Basement`. Source columns must be numeric and
/// already imputed.
pub fn add_engineered_features(ds: &mut Dataset) -> Result<()> {
    let bsmt_sf = ds.numeric("Total Bsmt SF")?;
    let first_sf = ds.numeric("1st Flr SF")?;
    let second_sf = ds.numeric("2nd Flr SF")?;
    let yr_sold = ds.numeric("Yr Sold")?;
    let year_built = ds.numeric("Year Built")?;
    let year_remod = ds.numeric("Year Remod/Add")?;
    let bsmt_full = ds.numeric("Bsmt Full Bath")?;
    let bsmt_half = ds.numeric("Bsmt Half Bath")?;
    let full_bath = ds.numeric("Full Bath")?;
    let half_bath = ds.numeric("Half Bath")?;
    let garage_area = ds.numeric("Garage Area")?;

    let total_sf = (0..ds.n_rows())
        .map(|i| bsmt_sf[i] + first_sf[i] + second_sf[i])
        .collect();
    let house_age = yr_sold.iter().zip(&year_built).map(|(s, b)| s - b).collect();
    let since_remodel = yr_sold.iter().zip(&year_remod).map(|(s, r)| s - r).collect();
    let bathrooms = (0..ds.n_rows())
        .map(|i| bsmt_full[i] + 0.5 * bsmt_half[i] + full_bath[i] + 0.5 * half_bath[i])
        .collect();

    ds.insert_numeric("Total SF", total_sf)?;
    ds.insert_numeric("House Age", house_age)?;
    ds.insert_numeric("Years Since Remodel", since_remodel)?;
    ds.insert_numeric("Total Bathrooms", bathrooms)?;
    ds.insert_numeric("Has Garage", indicator(&garage_area))?;
    ds.insert_numeric("Has Basement", indicator(&bsmt_sf))?;
    Ok(())
}
