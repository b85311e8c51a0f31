/*!

This is the long-form manual for `survey_tally` and `echisdash`.

## Pipeline

Every run of the dashboard goes through the same steps:

1. the submissions are read from a data source (a CSV file, an Excel worksheet or
   the KoboToolbox API) into a [`RowSet`](crate::RowSet);
2. the filters are applied: first the gender, then the submission date range;
3. each panel of the dashboard runs one aggregation on the filtered rows;
4. the panels are written out as a JSON document.

Nothing is kept between two runs.

## Input formats

* `csv` A header row followed by one row per submission.
* `excel` One worksheet of an Excel (.xlsx) file, with the header in the first row.
  The worksheet of the eCHIS exports is called `CHW eCHIS`.
* `kobo` The `data` endpoint of a KoboToolbox form. The answer is a JSON object, the
  submissions are in its `results` field.

Leading and trailing blanks in the column names are removed. Empty cells are missing answers.

## Aggregations

### Single-select

One category per distinct answer. Categories are sorted by decreasing count.

| answers               | tally              |
|-----------------------|--------------------|
| `Yego`, `Oya`, `Yego` | `Yego: 2`, `Oya: 1`|

### Multi-select

The answer is a list of options separated by spaces (this is how KoboToolbox
exports `select_multiple` questions). Each option is counted on its own, so one
submission may count several times.

| answers                                         | tally                                   |
|-------------------------------------------------|-----------------------------------------|
| `wifi network`, `wifi`, (empty), `network battery` | `wifi: 2`, `network: 2`, `battery: 1` |

### Conditional

Follow-up questions of the form "if yes, how often..." are only counted for the
respondents who answered yes to the gating question. The respondents who answered
no are gathered in one extra category (`Oya` by default), placed last.
Respondents who did not answer the gating question are not counted.

## Labels

Counting always happens on the raw answers. The translation tables (for example
`Yego` to `Yes`) only change the labels of the final tallies. Some tables also fix the
order of the categories (for frequency scales such as daily, weekly, monthly).

## Missing columns

Forms evolve and not every export has every question. When a panel needs a column
that is not in the data, it is skipped and the missing column names are reported.
The other panels are not affected.

*/
